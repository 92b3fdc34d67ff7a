//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive): 窗口 > 0, read_rate > 0, batch_size >= 1 ...
//! - 数值必须有限 (NaN / inf 不允许)
//! - 实时窗口至少容纳 2 条记录, 且不超过 BufferConfig::MAX_LIVE_LEN
//! - replay 源必须提供 path, speed >= 0
//! - mock 源至少一个 channel, 随机参数有界 (jitter / noise / drift)
//! - sink 名称非空且唯一

use std::collections::HashSet;

use contracts::{ContractError, ExperimentBlueprint, SinkType, SourceKind};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 ExperimentBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    validate_finite(blueprint)?;
    validate_fields(blueprint)?;
    validate_live_window(blueprint)?;
    validate_source(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段级范围校验
fn validate_fields(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let (field, message) = first_error("", &errors);
        ContractError::config_validation(field, message)
    })
}

/// 展开嵌套错误，取第一个叶子字段
fn first_error(prefix: &str, errors: &ValidationErrors) -> (String, String) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .first()
                    .map(|e| format!("out of range ({})", e.code))
                    .unwrap_or_else(|| "invalid value".to_string());
                return (path, message);
            }
            ValidationErrorsKind::Struct(inner) => return first_error(&path, inner),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_error(&format!("{path}[{idx}]"), inner);
                }
            }
        }
    }
    (prefix.to_string(), "invalid value".to_string())
}

/// 浮点参数必须有限
fn validate_finite(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    let checks = [
        ("differencer.window_duration_s", blueprint.differencer.window_duration_s),
        ("differencer.window_stride_s", blueprint.differencer.window_stride_s),
        ("buffer.read_rate_hz", blueprint.buffer.read_rate_hz),
        ("buffer.window_s", blueprint.buffer.window_s),
        ("source.speed", blueprint.source.speed),
    ];
    for (field, value) in checks {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite number, got {value}"),
            ));
        }
    }
    Ok(())
}

/// 实时窗口 N = read_rate × window 至少 2 条
fn validate_live_window(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    let n = blueprint.buffer.checked_live_len()?;
    if n < 2 {
        return Err(ContractError::config_validation(
            "buffer.read_rate_hz / buffer.window_s",
            format!("live window holds {n} record(s), at least 2 are required"),
        ));
    }
    if let Some(limit) = blueprint.buffer.history_limit {
        if limit < n {
            return Err(ContractError::config_validation(
                "buffer.history_limit",
                format!("history_limit ({limit}) must be >= live window length ({n})"),
            ));
        }
    }
    Ok(())
}

/// 校验事件源配置
fn validate_source(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    let source = &blueprint.source;
    if source.speed < 0.0 {
        return Err(ContractError::config_validation(
            "source.speed",
            format!("speed must be >= 0, got {}", source.speed),
        ));
    }
    match source.kind {
        SourceKind::Replay => {
            if source.path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                return Err(ContractError::config_validation(
                    "source.path",
                    "replay source requires a path",
                ));
            }
        }
        SourceKind::Mock => {
            source.mock.check_ranges().map_err(|e| match e {
                ContractError::ConfigValidation { field, message } => {
                    ContractError::config_validation(format!("source.mock.{field}"), message)
                }
                other => other,
            })?;
        }
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &ExperimentBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].queue_capacity"),
                "queue_capacity must be >= 1",
            ));
        }
        if sink.sink_type == SinkType::Jsonl && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].params.path"),
                "jsonl sink requires a 'path' parameter",
            ));
        }
    }
    Ok(())
}
