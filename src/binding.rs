//! Keyword argument binding
//!
//! Foreign calls are positional. Keyword arguments are placed into the
//! slot of the parameter they name; gaps before the last named slot are
//! filled from declared defaults.
//!
//! ```text
//! make_date(year, month = 1, day = 1)
//!
//! positional [1900]  +  {day: 20}   →   [1900, 1, 20]
//! ```

use ferry_wire::{ParamInfo, Value};
use thiserror::Error;

/// Keyword arguments did not fit the callee's signature.
///
/// Raised before any frame is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("{callee}() has no parameter named '{name}'")]
    UnknownKeyword { callee: String, name: String },

    #[error("{callee}() got multiple values for parameter '{name}'")]
    Duplicate { callee: String, name: String },

    #[error("{callee}() missing required argument '{name}'")]
    Missing { callee: String, name: String },

    #[error("{callee}(): variadic parameter '{name}' cannot be passed by keyword")]
    Variadic { callee: String, name: String },

    #[error("signature of {callee}() is unknown, keyword arguments cannot be bound")]
    NoSignature { callee: String },
}

/// Merge `keywords` into `positional` following `params`.
pub fn bind(
    callee: &str,
    params: &[ParamInfo],
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
) -> Result<Vec<Value>, BindingError> {
    if keywords.is_empty() {
        return Ok(positional);
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (name, value) in keywords {
        let index = params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| BindingError::UnknownKeyword {
                callee: callee.to_string(),
                name: name.clone(),
            })?;
        if params[index].variadic {
            return Err(BindingError::Variadic {
                callee: callee.to_string(),
                name,
            });
        }
        if index < positional.len() || slots[index].is_some() {
            return Err(BindingError::Duplicate {
                callee: callee.to_string(),
                name,
            });
        }
        slots[index] = Some(value);
    }

    // Only slots up to the last keyword need filling
    let last = slots.iter().rposition(Option::is_some).unwrap_or(0);
    let mut args = positional;
    for (index, param) in params.iter().enumerate().take(last + 1).skip(args.len()) {
        let value = match slots[index].take() {
            Some(value) => value,
            None if param.has_default => param.default.clone(),
            None => {
                return Err(BindingError::Missing {
                    callee: callee.to_string(),
                    name: param.name.clone(),
                })
            }
        };
        args.push(value);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date_params() -> Vec<ParamInfo> {
        vec![
            ParamInfo::required("year"),
            ParamInfo::required("month"),
            ParamInfo::required("day"),
        ]
    }

    fn kw(pairs: &[(&str, i64)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::Int(*v))).collect()
    }

    #[test]
    fn keywords_are_reordered_into_positions() {
        let args = bind("make_date", &date_params(), vec![], kw(&[("day", 20), ("year", 1900), ("month", 10)]))
            .expect("bind");
        assert_eq!(args, vec![Value::Int(1900), Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn positional_prefix_is_kept() {
        let args = bind("make_date", &date_params(), vec![Value::Int(1900)], kw(&[("day", 20), ("month", 10)]))
            .expect("bind");
        assert_eq!(args, vec![Value::Int(1900), Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn gaps_take_declared_defaults() {
        let params = vec![
            ParamInfo::required("year"),
            ParamInfo::optional("month", 1),
            ParamInfo::optional("day", 1),
        ];
        let args = bind("make_date", &params, vec![Value::Int(1900)], kw(&[("day", 20)])).expect("bind");
        assert_eq!(args, vec![Value::Int(1900), Value::Int(1), Value::Int(20)]);
    }

    #[test]
    fn gap_without_default_is_missing() {
        let err = bind("make_date", &date_params(), vec![], kw(&[("day", 20)])).expect_err("year missing");
        assert_eq!(
            err,
            BindingError::Missing { callee: "make_date".into(), name: "year".into() }
        );
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = bind("make_date", &date_params(), vec![], kw(&[("hour", 1)])).expect_err("unknown");
        assert!(matches!(err, BindingError::UnknownKeyword { ref name, .. } if name == "hour"));
    }

    #[test]
    fn positional_and_keyword_for_same_parameter_is_rejected() {
        let err = bind("make_date", &date_params(), vec![Value::Int(1900)], kw(&[("year", 1901)]))
            .expect_err("duplicate");
        assert!(matches!(err, BindingError::Duplicate { ref name, .. } if name == "year"));
    }

    #[test]
    fn variadic_cannot_be_named() {
        let params = vec![ParamInfo::required("format"), ParamInfo::variadic("values")];
        let err = bind("sprintf", &params, vec![Value::from("%d")], kw(&[("values", 1)])).expect_err("variadic");
        assert!(matches!(err, BindingError::Variadic { .. }));
    }

    proptest! {
        #[test]
        fn keyword_order_never_matters(
            order in Just(vec![0usize, 1, 2]).prop_shuffle(),
            values in prop::array::uniform3(any::<i64>()),
        ) {
            let names = ["year", "month", "day"];
            let keywords = order
                .iter()
                .map(|&i| (names[i].to_string(), Value::Int(values[i])))
                .collect();
            let args = bind("make_date", &date_params(), vec![], keywords).expect("bind");
            prop_assert_eq!(args, values.iter().map(|&v| Value::Int(v)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn no_keywords_passes_through_untouched() {
        let args = bind("make_date", &date_params(), vec![Value::Int(1)], vec![]).expect("bind");
        assert_eq!(args, vec![Value::Int(1)]);
    }
}
