use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::parser::ast::Node;

lazy_static! {
    /// Named constants the target understands as literal operands.
    pub static ref CONSTANTS: HashMap<&'static str, f64> = {
        let mut m = HashMap::new();
        m.insert("epsilon", 4.9406564584124654e-324);
        m.insert("ninf", f64::NEG_INFINITY);
        m.insert("pinf", f64::INFINITY);
        m.insert("nan", f64::NAN);
        m.insert("deg2rad", 0.0174532923847437);
        m.insert("rad2deg", 57.2957801818848);
        m.insert("pi", 3.14159265358979);
        m
    };

    /// Built-in functions mapped to their argument count.
    pub static ref BUILTIN_FUNCTIONS: HashMap<&'static str, usize> = {
        let mut m = HashMap::new();
        for name in [
            "abs", "acos", "asin", "atan", "ceil", "cos", "exp", "floor", "log", "round", "sin",
            "sqrt", "tan", "trunc", "not",
        ] {
            m.insert(name, 1);
        }
        for name in [
            "atan2", "max", "min", "mod", "xor", "nor", "and", "or", "sll", "srl", "sra", "sla",
        ] {
            m.insert(name, 2);
        }
        m.insert("rand", 0);
        m.insert("select", 3);
        m
    };

    /// Statement-only operations that produce no value.
    pub static ref PSEUDO_OPS: HashMap<&'static str, usize> = {
        let mut m = HashMap::new();
        m.insert("sleep", 1);
        m.insert("yield", 0);
        m.insert("hcf", 0);
        m
    };
}

pub fn is_constant(name: &str) -> bool {
    CONSTANTS.contains_key(name)
}

/// Parses decimal, `$`-hex and `%`-binary literal text, with an optional
/// leading `-`.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let value = if let Some(bits) = digits.strip_prefix('%') {
        let bits: String = bits.chars().filter(|c| *c != '_').collect();
        if bits.is_empty() {
            return None;
        }
        u64::from_str_radix(&bits, 2).ok()? as i64 as f64
    } else if let Some(hex) = digits.strip_prefix('$') {
        u64::from_str_radix(hex, 16).ok()? as i64 as f64
    } else {
        match digits.chars().next() {
            Some(c) if c.is_ascii_digit() || c == '.' => digits.parse::<f64>().ok()?,
            _ => return None,
        }
    };

    Some(if negative { -value } else { value })
}

/// Compile-time value of a literal node, if it has one.
pub fn value_of(node: &Node) -> Option<f64> {
    match node {
        Node::Numeric(text) => parse_numeric(text),
        Node::ConstantRef(name) => CONSTANTS.get(name.as_str()).copied(),
        Node::HashLiteral(s) => Some(hash(s) as f64),
        _ => None,
    }
}

/// Truthiness used by branches: anything below 1 is false, NaN included.
pub fn is_true(value: f64) -> bool {
    value >= 1.0
}

/// CRC32 of the string, reinterpreted as signed. Characters outside ASCII
/// hash as `?`.
pub fn hash(s: &str) -> i32 {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    crc32fast::hash(&bytes) as i32
}

/// Encodes a folded value as a literal node the target accepts.
pub fn number_node(value: f64) -> Node {
    if value.is_nan() {
        Node::ConstantRef("nan".to_owned())
    } else if value == f64::INFINITY {
        Node::ConstantRef("pinf".to_owned())
    } else if value == f64::NEG_INFINITY {
        Node::ConstantRef("ninf".to_owned())
    } else {
        Node::Numeric(format!("{}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_literal_form() {
        assert_eq!(parse_numeric("42"), Some(42.0));
        assert_eq!(parse_numeric("3.25"), Some(3.25));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("-7"), Some(-7.0));
        assert_eq!(parse_numeric("$FF"), Some(255.0));
        assert_eq!(parse_numeric("$ff"), Some(255.0));
        assert_eq!(parse_numeric("%1010_0001"), Some(161.0));
        assert_eq!(parse_numeric("-$10"), Some(-16.0));
    }

    #[test]
    fn rejects_non_literals() {
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("%"), None);
        assert_eq!(parse_numeric("$"), None);
        assert_eq!(parse_numeric("%102"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn hashes_as_signed_crc32() {
        assert_eq!(hash("123456789"), -873187034);
        assert_eq!(hash(""), 0);
        assert_eq!(hash("StructureSolidFuelGenerator"), 813146305);
        assert_eq!(hash("StructureGasSensor"), -1252983604);
    }

    #[test]
    fn non_ascii_hashes_as_question_mark() {
        assert_eq!(hash("Furnäce"), hash("Furn?ce"));
    }

    #[test]
    fn constants_have_values() {
        assert_eq!(
            value_of(&Node::ConstantRef("pi".to_owned())),
            Some(3.14159265358979)
        );
        assert!(value_of(&Node::ConstantRef("nan".to_owned()))
            .unwrap()
            .is_nan());
        assert_eq!(value_of(&Node::ConstantRef("tau".to_owned())), None);
        assert_eq!(value_of(&Node::HashLiteral("".to_owned())), Some(0.0));
    }

    #[test]
    fn truthiness_needs_at_least_one() {
        assert!(is_true(1.0));
        assert!(is_true(2.5));
        assert!(!is_true(0.99));
        assert!(!is_true(-1.0));
        assert!(!is_true(f64::NAN));
    }

    #[test]
    fn folded_values_stay_valid_literals() {
        assert_eq!(number_node(14.0), Node::Numeric("14".to_owned()));
        assert_eq!(number_node(-0.5), Node::Numeric("-0.5".to_owned()));
        assert_eq!(number_node(1.0 / 0.0), Node::ConstantRef("pinf".to_owned()));
        assert_eq!(number_node(-1.0 / 0.0), Node::ConstantRef("ninf".to_owned()));
        assert_eq!(number_node(0.0 / 0.0), Node::ConstantRef("nan".to_owned()));
    }
}
