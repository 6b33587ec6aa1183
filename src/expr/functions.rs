// src/expr/functions.rs

//! Built-in helper functions callable from expressions.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::error::EvalError;
use super::semver;
use super::value::Value;
use crate::fs::FileSystem;

/// Filesystem access for `fileExists`, with relative paths resolved against
/// `base_dir` when one is set.
pub struct FunctionEnv<'a> {
    pub fs: &'a dyn FileSystem,
    pub base_dir: Option<&'a Path>,
}

/// Call the named helper with already-evaluated arguments.
pub fn call(name: &str, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, EvalError> {
    match name {
        "contains" => {
            let [haystack, needle] = expect_args::<2>(name, args)?;
            Ok(Value::Bool(haystack.to_string().contains(&needle.to_string())))
        }
        "startsWith" => {
            let [value, prefix] = expect_args::<2>(name, args)?;
            Ok(Value::Bool(value.to_string().starts_with(&prefix.to_string())))
        }
        "endsWith" => {
            let [value, suffix] = expect_args::<2>(name, args)?;
            Ok(Value::Bool(value.to_string().ends_with(&suffix.to_string())))
        }
        "matches" => {
            let [value, pattern] = expect_args::<2>(name, args)?;
            let re = Regex::new(&pattern.to_string())
                .map_err(|e| EvalError::invalid_argument(name, format!("bad regex: {e}")))?;
            Ok(Value::Bool(re.is_match(&value.to_string())))
        }
        "fileExists" => {
            let [path] = expect_args::<1>(name, args)?;
            let path = path.to_string();
            if path.is_empty() {
                return Err(EvalError::invalid_argument(name, "path is empty"));
            }
            Ok(Value::Bool(env.fs.exists(&resolve(env.base_dir, &path))))
        }
        "semverCompare" => {
            let [a, b] = expect_args::<2>(name, args)?;
            let ordering = semver::compare(&a.to_string(), &b.to_string())
                .map_err(|message| EvalError::invalid_argument(name, message))?;
            let n = match ordering {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            Ok(Value::Num(n as f64))
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn expect_args<'v, const N: usize>(
    name: &str,
    args: &'v [Value],
) -> Result<[&'v Value; N], EvalError> {
    if args.len() != N {
        return Err(EvalError::Arity {
            function: name.to_string(),
            expected: N,
            got: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| &args[i]))
}

fn resolve(base_dir: Option<&Path>, path: &str) -> PathBuf {
    let path = Path::new(path);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}
