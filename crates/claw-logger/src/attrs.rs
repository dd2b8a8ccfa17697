//! Attribute values, attribute sets and call-argument splitting.
//!
//! This module provides:
//! - [`Value`] — Closed set of attribute value kinds
//! - [`Attrs`] — Immutable-per-call key/value set with overlay merging
//! - [`Arg`] / [`CallArgs`] — Arguments passed to a logging call
//! - [`merge_call_args`] — Turns call arguments into a single [`Attrs`]

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// An attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes, displayed as lowercase hex.
    Bytes(Vec<u8>),
    /// Anything else, captured through its display form.
    Other(String),
}

impl Value {
    /// Captures any displayable value.
    pub fn display(value: &impl fmt::Display) -> Self {
        Self::Other(value.to_string())
    }

    /// Captures a value through its debug form.
    pub fn debug(value: &impl fmt::Debug) -> Self {
        Self::Other(format!("{value:?}"))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Other(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(s) | Self::Other(s) => serializer.serialize_str(s),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::UInt(n) => serializer.serialize_u64(*n),
            Self::Float(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Bytes(bytes) => serializer.serialize_str(&hex::encode(bytes)),
        }
    }
}

/// Generates `From` conversions into both [`Value`] and [`Arg`].
macro_rules! impl_value_from {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }

            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_value_from! {
    String => |v| Value::Str(v),
    &str => |v| Value::Str(v.to_string()),
    &String => |v| Value::Str(v.clone()),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u32 => |v| Value::UInt(u64::from(v)),
    u64 => |v| Value::UInt(v),
    usize => |v| Value::UInt(v as u64),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    bool => |v| Value::Bool(v),
    Vec<u8> => |v| Value::Bytes(v),
    &[u8] => |v| Value::Bytes(v.to_vec()),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// A set of named attributes.
///
/// Keys are unique; iteration is in key order so rendered output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attrs(BTreeMap<String, Value>);

impl Attrs {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, returning the updated set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts an attribute, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the attributes in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Returns a new set holding `self` overlaid with `overlay`.
    ///
    /// Keys present in both take the overlay's value. Neither input is
    /// modified.
    #[must_use]
    pub fn merge(&self, overlay: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in overlay {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Inserts `value` only if `key` is not already present.
    fn insert_if_absent(&mut self, key: String, value: Value) {
        self.0.entry(key).or_insert(value);
    }
}

impl fmt::Display for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Attrs {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One argument of a logging call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A positional value, bound to `{}` placeholders in order.
    Value(Value),
    /// Explicit named attributes. Only meaningful as the last argument.
    Attrs(Attrs),
}

impl From<Attrs> for Arg {
    fn from(attrs: Attrs) -> Self {
        Self::Attrs(attrs)
    }
}

/// The full argument list of a logging call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(pub Vec<Arg>);

impl CallArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an argument.
    #[must_use]
    pub fn push(mut self, arg: impl Into<Arg>) -> Self {
        self.0.push(arg.into());
        self
    }
}

impl From<()> for CallArgs {
    fn from((): ()) -> Self {
        Self::new()
    }
}

impl From<Attrs> for CallArgs {
    fn from(attrs: Attrs) -> Self {
        Self(vec![Arg::Attrs(attrs)])
    }
}

impl From<Vec<Arg>> for CallArgs {
    fn from(args: Vec<Arg>) -> Self {
        Self(args)
    }
}

/// Builds an [`Attrs`] from `key => value` pairs.
///
/// ```
/// use claw_logger::attrs;
///
/// let attrs = attrs! { "user" => "ada", "retries" => 3 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attrs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::Attrs::new();
        $(attrs.insert($key, $value);)+
        attrs
    }};
}

/// Builds [`CallArgs`] from positional values, optionally ending with an
/// [`Attrs`].
///
/// ```
/// use claw_logger::{args, attrs};
///
/// let args = args!["bike", 300, attrs! { "shop" => "north" }];
/// assert_eq!(args.0.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        $crate::CallArgs(vec![$($crate::Arg::from($arg)),*])
    };
}

/// Collapses call arguments into one attribute set.
///
/// A trailing [`Arg::Attrs`] supplies the explicit attributes. Every other
/// argument is keyed by its position (`"0"`, `"1"`, ...) and added only where
/// the explicit set does not already hold that key. Attribute sets found
/// before the last position are treated as positional values.
#[must_use]
pub fn merge_call_args(args: CallArgs) -> Attrs {
    merge_call_args_with(&Attrs::new(), args)
}

/// Like [`merge_call_args`], with `defaults` underneath everything the call
/// supplies, positional values included.
#[must_use]
pub fn merge_call_args_with(defaults: &Attrs, args: CallArgs) -> Attrs {
    let mut args = args.0;
    let mut call_site = match args.last() {
        Some(Arg::Attrs(_)) => match args.pop() {
            Some(Arg::Attrs(attrs)) => attrs,
            _ => Attrs::new(),
        },
        _ => Attrs::new(),
    };

    for (index, arg) in args.into_iter().enumerate() {
        let value = match arg {
            Arg::Value(value) => value,
            Arg::Attrs(attrs) => Value::display(&attrs),
        };
        call_site.insert_if_absent(index.to_string(), value);
    }
    defaults.merge(&call_site)
}
