//! Conversion of literal filter arguments into typed [`Value`]s.

use time::format_description::well_known::Rfc3339;
use time::format_description::{self, OwnedFormatItem};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::trace;

use crate::config::{CompilerOptions, ConfigError};
use crate::query::errors::{CompileError, CompileResult};
use crate::query::metadata::AttributeType;
use crate::query::value::Value;

/// Converts one literal into a value of the attribute's semantic type.
///
/// Replacing the parser replaces the whole per-type table. The null token is
/// handled before the parser is consulted, so implementations never see it.
pub trait ArgumentParser: Send + Sync {
    /// Parses `argument` as `ty`.
    fn parse(&self, argument: &str, ty: &AttributeType) -> CompileResult<Value>;
}

/// Built-in parser dispatching on [`AttributeType`].
pub struct DefaultArgumentParser {
    date_formats: Vec<OwnedFormatItem>,
}

impl Default for DefaultArgumentParser {
    fn default() -> Self {
        let date_formats = CompilerOptions::default()
            .date_formats
            .iter()
            .filter_map(|format| format_description::parse_owned::<1>(format).ok())
            .collect();
        Self { date_formats }
    }
}

impl DefaultArgumentParser {
    /// Parser using the date formats from `options`.
    pub fn from_options(options: &CompilerOptions) -> Result<Self, ConfigError> {
        let mut date_formats = Vec::with_capacity(options.date_formats.len());
        for format in &options.date_formats {
            let item = format_description::parse_owned::<1>(format).map_err(|err| {
                ConfigError::Invalid {
                    key: "date_formats",
                    reason: format!("'{format}': {err}"),
                }
            })?;
            date_formats.push(item);
        }
        Ok(Self { date_formats })
    }

    fn parse_temporal(&self, argument: &str, declared: Option<&str>) -> CompileResult<Value> {
        let mismatch = || CompileError::mismatch(argument, "Temporal");
        if let Some(format) = declared {
            let item = format_description::parse_owned::<1>(format).map_err(|_| mismatch())?;
            return parse_instant(argument, &item).ok_or_else(mismatch);
        }
        if let Ok(instant) = OffsetDateTime::parse(argument, &Rfc3339) {
            return Ok(Value::from(instant));
        }
        self.date_formats
            .iter()
            .find_map(|item| parse_instant(argument, item))
            .ok_or_else(mismatch)
    }
}

/// Date-only matches land on midnight UTC.
fn parse_instant(argument: &str, item: &OwnedFormatItem) -> Option<Value> {
    if let Ok(datetime) = PrimitiveDateTime::parse(argument, item) {
        return Some(Value::from(datetime.assume_utc()));
    }
    Date::parse(argument, item)
        .ok()
        .map(|date| Value::from(date.midnight().assume_utc()))
}

impl ArgumentParser for DefaultArgumentParser {
    /// Surrounding whitespace is ignored for every type except text, which is
    /// taken verbatim.
    fn parse(&self, argument: &str, ty: &AttributeType) -> CompileResult<Value> {
        trace!(argument, ty = %ty, "coercing argument");
        let trimmed = argument.trim();
        match ty {
            AttributeType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| CompileError::mismatch(argument, ty)),
            AttributeType::Float => match trimmed.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Value::Float(x)),
                _ => Err(CompileError::mismatch(argument, ty)),
            },
            AttributeType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(CompileError::mismatch(argument, ty))
                }
            }
            AttributeType::Text | AttributeType::Object { .. } => {
                Ok(Value::String(argument.to_owned()))
            }
            AttributeType::Temporal { format } => self
                .parse_temporal(trimmed, format.as_deref())
                .map_err(|_| CompileError::mismatch(argument, "Temporal")),
            AttributeType::Enum { variants, .. } => variants
                .iter()
                .position(|variant| variant == trimmed)
                .map(|ordinal| Value::Enum {
                    ordinal: ordinal as u32,
                    name: trimmed.to_owned(),
                })
                .ok_or_else(|| CompileError::mismatch(argument, ty)),
            AttributeType::Reference { identifier, .. } => self.parse(argument, identifier),
        }
    }
}
