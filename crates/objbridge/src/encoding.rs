//! Type encodings for foreign method signatures.
//!
//! A signature is written in the Objective-C `@encode` style: the return
//! type, then the implicit `@` (self) and `:` (_cmd), then one character per
//! argument.
//!
//! - `"v@:"`: no return value, no arguments
//! - `"i@:i"`: int return, one int argument
//! - `"@@:@i"`: object return, an object argument and an int argument
//!
//! Host declarations name types with tokens instead (`id`, `int`, `bool`,
//! ...); [`Signature::from_tokens`] maps them to encodings.

use crate::value::Value;
use std::fmt;

/// One primitive type in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Void,
    Object,
    Class,
    Selector,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Bool,
    CString,
    Pointer,
    Unknown,
}

impl TypeCode {
    /// Parses a single encoding character.
    pub const fn from_char(ch: char) -> Option<TypeCode> {
        Some(match ch {
            'v' => TypeCode::Void,
            '@' => TypeCode::Object,
            '#' => TypeCode::Class,
            ':' => TypeCode::Selector,
            'c' => TypeCode::Char,
            'C' => TypeCode::UChar,
            's' => TypeCode::Short,
            'S' => TypeCode::UShort,
            'i' => TypeCode::Int,
            'I' => TypeCode::UInt,
            'l' => TypeCode::Long,
            'L' => TypeCode::ULong,
            'q' => TypeCode::LongLong,
            'Q' => TypeCode::ULongLong,
            'f' => TypeCode::Float,
            'd' => TypeCode::Double,
            'B' => TypeCode::Bool,
            '*' => TypeCode::CString,
            '^' => TypeCode::Pointer,
            '?' => TypeCode::Unknown,
            _ => return None,
        })
    }

    /// The encoding character.
    pub const fn as_char(self) -> char {
        match self {
            TypeCode::Void => 'v',
            TypeCode::Object => '@',
            TypeCode::Class => '#',
            TypeCode::Selector => ':',
            TypeCode::Char => 'c',
            TypeCode::UChar => 'C',
            TypeCode::Short => 's',
            TypeCode::UShort => 'S',
            TypeCode::Int => 'i',
            TypeCode::UInt => 'I',
            TypeCode::Long => 'l',
            TypeCode::ULong => 'L',
            TypeCode::LongLong => 'q',
            TypeCode::ULongLong => 'Q',
            TypeCode::Float => 'f',
            TypeCode::Double => 'd',
            TypeCode::Bool => 'B',
            TypeCode::CString => '*',
            TypeCode::Pointer => '^',
            TypeCode::Unknown => '?',
        }
    }

    /// Maps a host type token (`id`, `int`, `ulong`, ...) to its code.
    pub fn from_token(token: &str) -> Option<TypeCode> {
        Some(match token {
            "id" => TypeCode::Object,
            "class" => TypeCode::Class,
            "sel" => TypeCode::Selector,
            "char" => TypeCode::Char,
            "uchar" => TypeCode::UChar,
            "short" => TypeCode::Short,
            "ushort" => TypeCode::UShort,
            "int" => TypeCode::Int,
            "uint" => TypeCode::UInt,
            "long" => TypeCode::Long,
            "ulong" => TypeCode::ULong,
            "longlong" => TypeCode::LongLong,
            "ulonglong" => TypeCode::ULongLong,
            "float" => TypeCode::Float,
            "double" => TypeCode::Double,
            "bool" | "BOOL" => TypeCode::Bool,
            "void" => TypeCode::Void,
            _ => return None,
        })
    }

    /// Returns `true` if `value` can be passed where this type is declared.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            TypeCode::Void => false,
            TypeCode::Object | TypeCode::Pointer | TypeCode::Unknown => {
                !matches!(value, Value::Range(_))
            }
            TypeCode::Class | TypeCode::Selector | TypeCode::CString => {
                matches!(value, Value::Nil | Value::Str(_) | Value::Object(_))
            }
            TypeCode::Float | TypeCode::Double => {
                matches!(value, Value::Float(_) | Value::Int(_))
            }
            TypeCode::Bool => matches!(value, Value::Bool(_) | Value::Int(_)),
            TypeCode::UChar | TypeCode::UShort | TypeCode::UInt | TypeCode::ULong | TypeCode::ULongLong => {
                match value {
                    Value::Int(i) => *i >= 0,
                    Value::Bool(_) => true,
                    _ => false,
                }
            }
            _ => matches!(value, Value::Int(_) | Value::Bool(_)),
        }
    }
}

/// A type token or character that has no encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidToken(pub String);

/// A parsed method signature, without the implicit self and _cmd.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    ret: TypeCode,
    args: Vec<TypeCode>,
}

impl Signature {
    pub fn new(ret: TypeCode, args: Vec<TypeCode>) -> Self {
        Signature { ret, args }
    }

    /// Parses a full encoding such as `"i@:i"`.
    ///
    /// # Errors
    ///
    /// Returns the offending character if any character is not a type code,
    /// or `"@:"` if the implicit self and _cmd are missing.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::encoding::{Signature, TypeCode};
    ///
    /// let sig = Signature::parse("@@:i@").unwrap();
    /// assert_eq!(sig.ret(), TypeCode::Object);
    /// assert_eq!(sig.args(), &[TypeCode::Int, TypeCode::Object]);
    /// assert!(Signature::parse("i@").is_err());
    /// ```
    pub fn parse(encoding: &str) -> Result<Signature, InvalidToken> {
        let mut codes = Vec::with_capacity(encoding.len());
        for ch in encoding.chars() {
            codes.push(TypeCode::from_char(ch).ok_or_else(|| InvalidToken(ch.to_string()))?);
        }
        match codes.as_slice() {
            [ret, TypeCode::Object, TypeCode::Selector, args @ ..] => Ok(Signature {
                ret: *ret,
                args: args.to_vec(),
            }),
            _ => Err(InvalidToken("@:".to_string())),
        }
    }

    /// Builds a signature from host type tokens: the return type first, then
    /// one token per argument.
    ///
    /// # Errors
    ///
    /// Returns the first unrecognized token, or `"void"` if `void` appears as
    /// an argument type. An empty token list means a `void` method with no
    /// arguments.
    pub fn from_tokens(tokens: &[&str]) -> Result<Signature, InvalidToken> {
        let Some((ret, args)) = tokens.split_first() else {
            return Ok(Signature::new(TypeCode::Void, Vec::new()));
        };
        let ret = TypeCode::from_token(ret).ok_or_else(|| InvalidToken((*ret).to_string()))?;
        let args = args
            .iter()
            .map(|t| match TypeCode::from_token(t) {
                Some(TypeCode::Void) | None => Err(InvalidToken((*t).to_string())),
                Some(code) => Ok(code),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Signature { ret, args })
    }

    #[inline]
    pub fn ret(&self) -> TypeCode {
        self.ret
    }

    #[inline]
    pub fn args(&self) -> &[TypeCode] {
        &self.args
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// The full encoding string, including self and _cmd.
    pub fn encoding(&self) -> String {
        let mut out = String::with_capacity(self.args.len() + 3);
        out.push(self.ret.as_char());
        out.push_str("@:");
        out.extend(self.args.iter().map(|c| c.as_char()));
        out
    }

    /// Returns the index and declared type of the first argument that
    /// doesn't fit.
    pub fn first_mismatch(&self, args: &[Value]) -> Option<(usize, TypeCode)> {
        self.args
            .iter()
            .zip(args)
            .position(|(code, value)| !code.accepts(value))
            .map(|i| (i, self.args[i]))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding())
    }
}
