use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use simline::host::StaticHost;
use simline::script::lexer::{classify_number, tokenize};
use simline::script::token::Kind;
use simline::script::types::{self, TypeCtx};
use simline::script::Value;

fn ctx() -> TypeCtx {
    TypeCtx::new(Arc::new(StaticHost::new()))
}

fn symbols() -> HashSet<String> {
    ["+", "-", "*", "/", "==", "->", "<<"].iter().map(|s| (*s).to_owned()).collect()
}

proptest! {
    /// The tokenizer returns Ok or Err on any input but never panics.
    #[test]
    fn tokenizer_does_not_panic(s in "\\PC*") {
        let _ = tokenize(&s, &symbols());
    }

    #[test]
    fn tokenizer_survives_brackets_and_quotes(s in "[(){}\\[\\]\"`$%;, a-z0-9\\-]{0,40}") {
        let _ = tokenize(&s, &symbols());
    }

    #[test]
    fn decimal_and_hex_integers_classify(n in any::<i64>()) {
        prop_assert_eq!(classify_number(&n.to_string()), Some(Kind::Int(n as i128)));
        let u = n as u64;
        prop_assert_eq!(classify_number(&format!("{u:#x}")), Some(Kind::Int(u as i128)));
    }
}

proptest! {
    /// Modulo ranges always land inside their bounds and leave in-range
    /// values alone.
    #[test]
    fn modulo_range_stays_in_bounds(min in -1000i128..1000, span in 1i128..500, v in any::<i64>()) {
        let max = min + span - 1;
        let t = types::modulo_range(min, max);
        let mut c = ctx();
        let Value::Int(got) = t.normalize(&Value::Int(v as i128), &mut c).unwrap() else {
            panic!("modulo range returned a non-integer");
        };
        prop_assert!((min..=max).contains(&got));
        let v = v as i128;
        if (min..=max).contains(&v) {
            prop_assert_eq!(got, v);
            prop_assert!(c.notices.is_empty());
        } else {
            prop_assert_eq!((got - v).rem_euclid(span), 0);
            prop_assert_eq!(c.notices.len(), 1);
        }
    }

    /// Plain ranges accept exactly their bounds.
    #[test]
    fn range_accepts_iff_in_bounds(min in -1000i128..1000, span in 1i128..500, v in -2000i128..2000) {
        let max = min + span - 1;
        let t = types::range(min, max);
        let ok = t.normalize(&Value::Int(v), &mut ctx()).is_ok();
        prop_assert_eq!(ok, (min..=max).contains(&v));
    }

    /// Parsing a literal and normalizing the same value agree.
    #[test]
    fn parse_agrees_with_normalize(v in any::<i64>()) {
        let t = types::integer();
        let tok = tokenize(&v.to_string(), &HashSet::new()).unwrap();
        prop_assert_eq!(tok.len(), 1);
        let (parsed, used) = t.parse(&tok, &mut ctx()).unwrap();
        prop_assert_eq!(used, 1);
        prop_assert_eq!(parsed, t.normalize(&Value::Int(v as i128), &mut ctx()).unwrap());
    }

    /// Polymorphic types take the first alternative that accepts.
    #[test]
    fn poly_takes_first_match(n in any::<i64>(), s in "[a-z]{1,8}") {
        let t = types::poly(vec![types::integer(), types::float(), types::string()]);
        let mut c = ctx();
        prop_assert_eq!(t.normalize(&Value::Int(n as i128), &mut c).unwrap(), Value::Int(n as i128));
        prop_assert_eq!(t.normalize(&Value::Str(s.clone()), &mut c).unwrap(), Value::Str(s));
    }
}
