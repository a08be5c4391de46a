//! Structured body serialization.
//!
//! JSON and XML bodies bypass templates entirely: the value is serialized in
//! one step and written straight to the response.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Serializes data to JSON, pretty-printed with two-space indentation when
/// `indent` is set.
pub fn to_json<T: Serialize + ?Sized>(data: &T, indent: bool) -> Result<Vec<u8>, SerializeError> {
    if indent {
        Ok(serde_json::to_vec_pretty(data)?)
    } else {
        Ok(serde_json::to_vec(data)?)
    }
}

/// Serializes data to XML, indented by two spaces per level when `indent`
/// is set. The root element is named after the type (or its serde rename).
///
/// Values that carry no element name of their own (strings, numbers,
/// sequences) are wrapped in a root named after their type, `<string>`,
/// `<int>`, `<float64>` and so on.
pub fn to_xml<T: Serialize + ?Sized>(data: &T, indent: bool) -> Result<Vec<u8>, SerializeError> {
    let out = match write_xml(data, None, indent) {
        Err(quick_xml::DeError::Unsupported(_)) => {
            write_xml(data, Some(&fallback_root::<T>()), indent)?
        }
        other => other?,
    };
    Ok(out.into_bytes())
}

fn write_xml<T: Serialize + ?Sized>(
    data: &T,
    root: Option<&str>,
    indent: bool,
) -> Result<String, quick_xml::DeError> {
    let mut out = String::new();
    let mut ser = match root {
        Some(_) => quick_xml::se::Serializer::with_root(&mut out, root)?,
        None => quick_xml::se::Serializer::new(&mut out),
    };
    if indent {
        ser.indent(' ', 2);
    }
    data.serialize(ser)?;
    Ok(out)
}

/// Root element name for `T`, from its type name.
fn fallback_root<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let base = base.rsplit("::").next().unwrap_or(base);
    let base = base.rsplit(' ').next().unwrap_or(base);
    let name: String = base
        .trim_start_matches(|c: char| !c.is_ascii_alphabetic() && c != '_')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match name.as_str() {
        "str" | "String" | "char" => "string".to_string(),
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" => "int".to_string(),
        "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => "uint".to_string(),
        "f32" => "float32".to_string(),
        "f64" => "float64".to_string(),
        "" => "value".to_string(),
        _ => name,
    }
}
