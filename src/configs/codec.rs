//! Преобразование конфигов сервера в плоскую карту `section.key -> value` и обратно.
//!
//! Единая модель значения для всех форматов: `serde_json::Value`. Порядок
//! ключей сохраняется (serde_json собран с `preserve_order`).

use mcpanel_core::ConfigFormat;
use serde_json::{Map, Number, Value};

pub type FlatMap = Map<String, Value>;

/// YAML пишется без ограничения вложенности, но редактор должен уметь хотя бы столько
pub const MIN_YAML_DEPTH: usize = 10;

/// Разворачивает вложенные объекты и массивы в ключи через точку.
///
/// Элементы массива получают индекс как сегмент пути (`list.0`). Пустые
/// объекты и массивы остаются листьями, чтобы не потеряться при сохранении.
pub fn flatten(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(key, child, &mut out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(&i.to_string(), child, &mut out);
            }
        }
        _ => {}
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut FlatMap) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{}.{}", prefix, key), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, i), child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Обратная операция: ключ режется по `.`, последний сегмент хранит значение.
/// Объекты с ключами ровно `0..n` снова становятся массивами.
pub fn unflatten(flat: &FlatMap) -> FlatMap {
    let mut root = FlatMap::new();
    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value.clone());
    }
    match restore_arrays(Value::Object(root)) {
        Value::Object(map) => map,
        _ => FlatMap::new(),
    }
}

fn insert_path(map: &mut FlatMap, parts: &[&str], value: Value) {
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut current = map;
    for part in parents {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(FlatMap::new()));
        if !slot.is_object() {
            // Скаляр на месте промежуточного узла заменяется объектом
            *slot = Value::Object(FlatMap::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

fn restore_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let is_sequence = !map.is_empty()
                && map
                    .keys()
                    .enumerate()
                    .all(|(i, key)| key.parse::<usize>().ok() == Some(i));
            if is_sequence {
                Value::Array(map.into_iter().map(|(_, v)| restore_arrays(v)).collect())
            } else {
                Value::Object(map.into_iter().map(|(k, v)| (k, restore_arrays(v))).collect())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(restore_arrays).collect()),
        other => other,
    }
}

/// Текст файла в плоскую карту.
///
/// `None` для пустого содержимого. Ошибка разбора даёт пустую карту, как и
/// форматы без структурного редактора (JSON5, CONF).
pub fn parse(format: ConfigFormat, raw: &str) -> Option<FlatMap> {
    if raw.is_empty() {
        return None;
    }

    let parsed = match format {
        ConfigFormat::Properties => Some(Value::Object(parse_properties(raw))),
        ConfigFormat::Yaml => match serde_yaml::from_str::<serde_yaml::Value>(raw) {
            Ok(doc) => Some(yaml_to_json(doc)),
            Err(e) => {
                log::warn!("Failed to parse YAML config: {}", e);
                None
            }
        },
        ConfigFormat::Toml => match toml::from_str::<toml::Table>(raw) {
            Ok(table) => Some(toml_to_json(toml::Value::Table(table))),
            Err(e) => {
                log::warn!("Failed to parse TOML config: {}", e);
                None
            }
        },
        ConfigFormat::Json5 | ConfigFormat::Conf => None,
    };

    Some(parsed.map(|v| flatten(&v)).unwrap_or_default())
}

/// Вложенная карта обратно в текст. `None`, если сохранять нечего или формат
/// редактируется только как текст.
pub fn serialize(format: ConfigFormat, content: &FlatMap) -> Option<String> {
    if content.is_empty() {
        return None;
    }

    match format {
        ConfigFormat::Properties => Some(serialize_properties(content)),
        ConfigFormat::Yaml => serde_yaml::to_string(content)
            .map_err(|e| log::warn!("Failed to serialize YAML config: {}", e))
            .ok(),
        ConfigFormat::Toml => toml::to_string(&tables_last(content))
            .map_err(|e| log::warn!("Failed to serialize TOML config: {}", e))
            .ok(),
        ConfigFormat::Json5 | ConfigFormat::Conf => None,
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn parse_properties(raw: &str) -> FlatMap {
    let mut out = FlatMap::new();
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        out.insert(key.to_string(), Value::String(value.to_string()));
    }
    out
}

fn serialize_properties(content: &FlatMap) -> String {
    flatten(&Value::Object(content.clone()))
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}={}", key, s),
            Value::Bool(b) => format!("{}={}", key, b),
            Value::Number(n) => format!("{}={}", key, n),
            Value::Null | Value::Array(_) | Value::Object(_) => format!("{}=", key),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// YAML / TOML conversion
// ============================================================================

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Ключи YAML бывают числами и булевыми, в плоской карте они строки
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect(),
        ),
    }
}

fn json_to_toml(value: &Value) -> toml::Value {
    match value {
        // В TOML нет null
        Value::Null => toml::Value::String(String::new()),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => toml::Value::Integer(i),
            None => toml::Value::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Array(items) => toml::Value::Array(items.iter().map(json_to_toml).collect()),
        Value::Object(map) => toml::Value::Table(tables_last(map)),
    }
}

/// Скалярные ключи перед таблицами: после заголовка `[table]` голый ключ
/// попал бы внутрь таблицы
fn tables_last(map: &FlatMap) -> toml::Table {
    let (scalars, tables): (Vec<_>, Vec<_>) = map.iter().partition(|(_, v)| !v.is_object());
    scalars
        .into_iter()
        .chain(tables)
        .map(|(k, v)| (k.clone(), json_to_toml(v)))
        .collect()
}
