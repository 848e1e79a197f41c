//! 数据契约校验
//!
//! 上游字段: `{userId: int, id: int, title: string(len>=5), body: string}`。
//! 不做任何类型转换，缺失或类型不符一律拒绝；多余字段忽略。

use crate::types::{NewsPost, RawRecord};
use serde_json::{Map, Value};
use thiserror::Error;

/// 标题最小长度（按字符计）
pub const MIN_TITLE_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("{0}: field required")]
    MissingField(&'static str),

    #[error("{field}: expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("title too short ({len} < {})", MIN_TITLE_LEN)]
    TitleTooShort { len: usize },
}

impl SchemaViolation {
    /// 违反规则涉及的字段
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SchemaViolation::NotAnObject => None,
            SchemaViolation::MissingField(field) => Some(*field),
            SchemaViolation::WrongType { field, .. } => Some(*field),
            SchemaViolation::TitleTooShort { .. } => Some("title"),
        }
    }
}

impl NewsPost {
    /// 构造时强制标题长度约束
    pub fn new(
        owner_id: i64,
        external_id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, SchemaViolation> {
        let title = title.into();
        let len = title.chars().count();
        if len < MIN_TITLE_LEN {
            return Err(SchemaViolation::TitleTooShort { len });
        }

        Ok(Self {
            owner_id,
            external_id,
            title,
            body: body.into(),
        })
    }
}

/// 校验一条原始记录
pub fn validate(raw: &RawRecord) -> Result<NewsPost, SchemaViolation> {
    let object = raw.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let owner_id = int_field(object, "userId")?;
    let external_id = int_field(object, "id")?;
    let title = str_field(object, "title")?;
    let body = str_field(object, "body")?;

    NewsPost::new(owner_id, external_id, title, body)
}

fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, SchemaViolation> {
    match object.get(name) {
        None | Some(Value::Null) => Err(SchemaViolation::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn int_field(object: &Map<String, Value>, name: &'static str) -> Result<i64, SchemaViolation> {
    field(object, name)?
        .as_i64()
        .ok_or(SchemaViolation::WrongType {
            field: name,
            expected: "integer",
        })
}

fn str_field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, SchemaViolation> {
    field(object, name)?
        .as_str()
        .ok_or(SchemaViolation::WrongType {
            field: name,
            expected: "string",
        })
}
