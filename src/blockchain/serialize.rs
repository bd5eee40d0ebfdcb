//! Lossless text rendering of arbitrary values.
//!
//! Contract results, log arguments and error details go through [`serialize`]
//! before they leave the crate. Rendering never panics and 256-bit integers keep
//! every digit.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, B256, I256, U256};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value with a stable textual rendering.
pub trait Render {
    fn render(&self) -> String;
}

/// Render any supported value to text.
pub fn serialize<T: Render + ?Sized>(value: &T) -> String {
    value.render()
}

impl<T: Render> Render for Option<T> {
    fn render(&self) -> String {
        match self {
            Some(value) => value.render(),
            None => "undefined".to_string(),
        }
    }
}

impl<T: Render> Render for [T] {
    fn render(&self) -> String {
        let items: Vec<String> = self.iter().map(Render::render).collect();
        format!("[{}]", items.join(", "))
    }
}

impl<T: Render> Render for Vec<T> {
    fn render(&self) -> String {
        self.as_slice().render()
    }
}

impl<T: Render + ?Sized> Render for &T {
    fn render(&self) -> String {
        (**self).render()
    }
}

impl Render for str {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl Render for String {
    fn render(&self) -> String {
        self.clone()
    }
}

macro_rules! render_display {
    ($($ty:ty),*) => {
        $(impl Render for $ty {
            fn render(&self) -> String {
                self.to_string()
            }
        })*
    };
}

render_display!(bool, u8, u32, u64, u128, usize, i64, U256, I256, Address, B256);

impl Render for Bytes {
    fn render(&self) -> String {
        format!("0x{}", alloy::hex::encode(self))
    }
}

impl Render for Value {
    fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items.render(),
            Value::Object(_) => stringify_numbers(self).to_string(),
            scalar => scalar.to_string(),
        }
    }
}

impl Render for DynSolValue {
    fn render(&self) -> String {
        match self {
            DynSolValue::Bool(b) => b.to_string(),
            DynSolValue::Int(i, _) => i.to_string(),
            DynSolValue::Uint(u, _) => u.to_string(),
            DynSolValue::FixedBytes(word, size) => {
                format!("0x{}", alloy::hex::encode(&word[..(*size).min(32)]))
            }
            DynSolValue::Address(a) => a.to_string(),
            DynSolValue::Bytes(b) => format!("0x{}", alloy::hex::encode(b)),
            DynSolValue::String(s) => s.clone(),
            DynSolValue::Array(items) | DynSolValue::FixedArray(items) => items.render(),
            DynSolValue::Tuple(_) => to_json(self).to_string(),
            other => format!("{other:?}"),
        }
    }
}

/// Structured JSON form of an ABI value with every integer rendered as a string.
pub fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        other => Value::String(other.render()),
    }
}

fn stringify_numbers(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(stringify_numbers).collect()),
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, stringify_numbers(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        other => other.clone(),
    }
}
