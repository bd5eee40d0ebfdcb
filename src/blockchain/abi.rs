//! Interface descriptions: parsing, function resolution and argument coercion.
//!
//! Contract methods are never dispatched by name at runtime. A call first
//! resolves a [`Function`] from the [`JsonAbi`] (failing closed when it is
//! absent), then runs the generic encode → call/send → decode pipeline in
//! `transaction.rs`.

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::json_abi::{Event, Function, JsonAbi, StateMutability};
use serde_json::Value;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::validate::parse_address;

/// Parse an interface description.
///
/// Accepts a JSON ABI array, a compiler artifact with an `abi` field, a JSON
/// array of human-readable signatures, or human-readable signatures separated
/// by newlines or semicolons.
pub fn parse_abi(source: &str) -> BlockchainResult<JsonAbi> {
    let source = source.trim();
    if source.is_empty() {
        return Err(BlockchainError::Validation("abi: interface description is empty".to_string()));
    }

    if source.starts_with('[') || source.starts_with('{') {
        let value: Value = serde_json::from_str(source)
            .map_err(|e| BlockchainError::Validation(format!("abi: invalid JSON: {e}")))?;
        let items = match value {
            Value::Object(mut artifact) => artifact.remove("abi").ok_or_else(|| {
                BlockchainError::Validation("abi: JSON object has no 'abi' field".to_string())
            })?,
            other => other,
        };
        return match items {
            Value::Array(entries) if entries.iter().all(Value::is_string) => {
                let signatures: Vec<&str> = entries.iter().filter_map(Value::as_str).collect();
                parse_human_readable(signatures)
            }
            other => serde_json::from_value(other)
                .map_err(|e| BlockchainError::Validation(format!("abi: {e}"))),
        };
    }

    parse_human_readable(
        source
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|line| !line.is_empty()),
    )
}

fn parse_human_readable<'a>(signatures: impl IntoIterator<Item = &'a str>) -> BlockchainResult<JsonAbi> {
    JsonAbi::parse(signatures)
        .map_err(|e| BlockchainError::Validation(format!("abi: invalid signature: {e}")))
}

/// Resolve a function by name (or full signature) and argument count.
pub fn resolve_function<'a>(
    abi: &'a JsonAbi,
    name: &str,
    arg_count: usize,
) -> BlockchainResult<&'a Function> {
    let by_signature = name.contains('(');
    let base_name = name.split('(').next().unwrap_or(name);

    let overloads = abi
        .function(base_name)
        .filter(|functions| !functions.is_empty())
        .ok_or_else(|| BlockchainError::Abi(format!("function '{name}' not found in ABI")))?;

    if by_signature {
        let wanted: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        return overloads
            .iter()
            .find(|f| f.signature() == wanted)
            .ok_or_else(|| BlockchainError::Abi(format!("function '{name}' not found in ABI")));
    }

    let mut matching = overloads.iter().filter(|f| f.inputs.len() == arg_count);
    match (matching.next(), matching.next()) {
        (Some(function), None) => Ok(function),
        (Some(_), Some(_)) => Err(BlockchainError::Abi(format!(
            "function '{name}' is overloaded with {arg_count} arguments; pass the full signature"
        ))),
        (None, _) => {
            let arities: Vec<String> = overloads.iter().map(|f| f.inputs.len().to_string()).collect();
            Err(BlockchainError::Abi(format!(
                "function '{name}' takes {} argument(s), got {arg_count}",
                arities.join(" or ")
            )))
        }
    }
}

/// True when calling `function` cannot change state.
pub fn is_read_only(function: &Function) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::Pure | StateMutability::View
    )
}

pub fn mutability_name(mutability: StateMutability) -> &'static str {
    match mutability {
        StateMutability::Pure => "pure",
        StateMutability::View => "view",
        StateMutability::NonPayable => "nonpayable",
        StateMutability::Payable => "payable",
    }
}

/// Look up an event by name or full signature.
pub fn resolve_event<'a>(abi: &'a JsonAbi, name: &str) -> BlockchainResult<&'a Event> {
    let base_name = name.split('(').next().unwrap_or(name);
    let events = abi
        .event(base_name)
        .filter(|events| !events.is_empty())
        .ok_or_else(|| BlockchainError::Abi(format!("event '{name}' not found in ABI")))?;

    if name.contains('(') {
        let wanted: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        events
            .iter()
            .find(|e| e.signature() == wanted)
            .ok_or_else(|| BlockchainError::Abi(format!("event '{name}' not found in ABI")))
    } else {
        events
            .first()
            .ok_or_else(|| BlockchainError::Abi(format!("event '{name}' not found in ABI")))
    }
}

/// Convert JSON arguments to ABI values for `function`'s inputs.
pub fn coerce_args(function: &Function, args: &[Value]) -> BlockchainResult<Vec<DynSolValue>> {
    if function.inputs.len() != args.len() {
        return Err(BlockchainError::Validation(format!(
            "args: function '{}' expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }
    function
        .inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (param, arg))| {
            let field = if param.name.is_empty() {
                format!("args[{i}]")
            } else {
                format!("args[{i}] ({})", param.name)
            };
            let ty = param
                .resolve()
                .map_err(|e| BlockchainError::Abi(format!("{field}: {e}")))?;
            coerce_value(&ty, arg, &field)
        })
        .collect()
}

fn coerce_value(ty: &DynSolType, value: &Value, field: &str) -> BlockchainResult<DynSolValue> {
    let invalid = |reason: String| BlockchainError::Validation(format!("{field}: {reason}"));

    match (ty, value) {
        (DynSolType::Address, Value::String(s)) => parse_address(s, field).map(DynSolValue::Address),
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_value(inner, item, &format!("{field}[{i}]")))
            .collect::<BlockchainResult<Vec<_>>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(invalid(format!("expected {len} elements, got {}", items.len())));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce_value(inner, item, &format!("{field}[{i}]")))
                .collect::<BlockchainResult<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(invalid(format!(
                    "expected a tuple of {} elements, got {}",
                    types.len(),
                    items.len()
                )));
            }
            types
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (ty, item))| coerce_value(ty, item, &format!("{field}.{i}")))
                .collect::<BlockchainResult<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => ty.coerce_str(s).map_err(|e| invalid(e.to_string())),
        (_, Value::Number(n)) => ty.coerce_str(&n.to_string()).map_err(|e| invalid(e.to_string())),
        (_, Value::Bool(b)) => ty
            .coerce_str(if *b { "true" } else { "false" })
            .map_err(|e| invalid(e.to_string())),
        (_, other) => Err(invalid(format!("cannot convert {other} to {}", ty.sol_type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use serde_json::json;

    const ERC20_JSON: &str = r#"[
        {"type":"function","name":"balanceOf","stateMutability":"view",
         "inputs":[{"name":"owner","type":"address"}],
         "outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"event","name":"Transfer","anonymous":false,
         "inputs":[{"name":"from","type":"address","indexed":true},
                   {"name":"to","type":"address","indexed":true},
                   {"name":"value","type":"uint256","indexed":false}]}
    ]"#;

    #[test]
    fn test_parse_json_abi() {
        let abi = parse_abi(ERC20_JSON).unwrap();
        assert!(abi.function("balanceOf").is_some());
        assert!(abi.event("Transfer").is_some());
    }

    #[test]
    fn test_parse_human_readable() {
        let abi = parse_abi(
            "function balanceOf(address owner) view returns (uint256)\n\
             event Transfer(address indexed from, address indexed to, uint256 value)",
        )
        .unwrap();
        let function = resolve_function(&abi, "balanceOf", 1).unwrap();
        assert!(is_read_only(function));

        let abi = parse_abi(r#"["function transfer(address to, uint256 amount) returns (bool)"]"#).unwrap();
        let function = resolve_function(&abi, "transfer", 2).unwrap();
        assert!(!is_read_only(function));
        assert_eq!(mutability_name(function.state_mutability), "nonpayable");
    }

    #[test]
    fn test_parse_artifact() {
        let artifact = format!(r#"{{"contractName":"Token","abi":{ERC20_JSON}}}"#);
        let abi = parse_abi(&artifact).unwrap();
        assert!(abi.function("transfer").is_some());
    }

    #[test]
    fn test_resolution_fails_closed() {
        let abi = parse_abi(ERC20_JSON).unwrap();
        let err = resolve_function(&abi, "mint", 1).unwrap_err();
        assert_eq!(err.to_string(), "ABI error: function 'mint' not found in ABI");

        let err = resolve_function(&abi, "transfer", 1).unwrap_err();
        assert!(err.to_string().contains("takes 2 argument(s), got 1"));

        assert!(resolve_function(&abi, "transfer(address,uint256)", 2).is_ok());
        assert!(resolve_event(&abi, "Approval").is_err());
    }

    #[test]
    fn test_overloads_resolve_by_arity() {
        let abi = parse_abi(
            "function safeTransferFrom(address from, address to, uint256 id)\n\
             function safeTransferFrom(address from, address to, uint256 id, bytes data)",
        )
        .unwrap();
        assert_eq!(resolve_function(&abi, "safeTransferFrom", 4).unwrap().inputs.len(), 4);
        assert_eq!(resolve_function(&abi, "safeTransferFrom", 3).unwrap().inputs.len(), 3);
    }

    #[test]
    fn test_coerce_args() {
        let abi = parse_abi(ERC20_JSON).unwrap();
        let function = resolve_function(&abi, "transfer", 2).unwrap();
        let values = coerce_args(
            function,
            &[
                json!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
                json!("1000000000000000000000000000000"),
            ],
        )
        .unwrap();
        assert_eq!(values[1], DynSolValue::Uint(U256::from(10u8).pow(U256::from(30u8)), 256));

        let err = coerce_args(function, &[json!("0x1234"), json!(1)]).unwrap_err();
        assert!(matches!(err, BlockchainError::Validation(_)));
        assert!(err.to_string().starts_with("args[0] (to)"));
    }

    #[test]
    fn test_coerce_nested_arrays() {
        let abi = parse_abi("function batch(uint256[] ids, bool[2] flags)").unwrap();
        let function = resolve_function(&abi, "batch", 2).unwrap();
        let values = coerce_args(function, &[json!([1, "2", 3]), json!([true, false])]).unwrap();
        match &values[0] {
            DynSolValue::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("expected array, got {other:?}"),
        }
        assert!(matches!(&values[1], DynSolValue::FixedArray(items) if items.len() == 2));

        let err = coerce_args(function, &[json!([1]), json!([true])]).unwrap_err();
        assert!(err.to_string().contains("expected 2 elements, got 1"));
    }
}
