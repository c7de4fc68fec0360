// src/version/compare.rs

//! Raw version ordering
//!
//! Release lists are sorted by their raw version strings, not by normalized
//! form. The ordering canonicalizes both strings into dot-separated parts and
//! compares part by part: numbers numerically, and named forms by rank
//! `dev < alpha = a < beta = b < RC = rc < number < pl = p`.

use std::cmp::Ordering;

/// Named version forms in lookup order; matched by prefix
const SPECIAL_FORMS: &[(&str, i32)] = &[
    ("dev", 0),
    ("alpha", 1),
    ("a", 1),
    ("beta", 2),
    ("b", 2),
    ("RC", 3),
    ("rc", 3),
    ("#", 4),
    ("pl", 5),
    ("p", 5),
];

/// Stand-in for "a number" when a numeric part meets a named one
const NUMBER_FORM: &str = "#N#";

/// Compare two raw version strings
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = canonicalize(left);
    let right = canonicalize(right);

    match (left.is_empty(), right.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_canonical(&left, &right),
    }
}

/// Rewrite separators to `.` and split digit/letter transitions
fn canonicalize(version: &str) -> String {
    let bytes = version.as_bytes();
    let Some((&first, rest)) = bytes.split_first() else {
        return String::new();
    };

    let mut out = Vec::with_capacity(bytes.len() * 2);
    out.push(first);
    let mut previous = first;

    for &current in rest {
        let transition = (is_non_digit(previous) && current.is_ascii_digit())
            || (previous.is_ascii_digit() && is_non_digit(current));

        if matches!(current, b'-' | b'_' | b'+') {
            push_separator(&mut out);
        } else if transition {
            push_separator(&mut out);
            out.push(current);
        } else if !current.is_ascii_alphanumeric() {
            push_separator(&mut out);
        } else {
            out.push(current);
        }
        previous = current;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn is_non_digit(byte: u8) -> bool {
    !byte.is_ascii_digit() && byte != b'.'
}

fn push_separator(out: &mut Vec<u8>) {
    if out.last() != Some(&b'.') {
        out.push(b'.');
    }
}

fn compare_canonical(left: &str, right: &str) -> Ordering {
    let mut left_rest = left;
    let mut right_rest = right;
    let mut left_more = true;
    let mut right_more = true;
    let mut ordering = Ordering::Equal;

    while left_more && right_more {
        let (left_part, left_tail) = split_part(left_rest);
        let (right_part, right_tail) = split_part(right_rest);
        left_more = left_tail.is_some();
        right_more = right_tail.is_some();

        ordering = compare_parts(left_part, right_part);
        if ordering != Ordering::Equal {
            break;
        }

        if let Some(tail) = left_tail {
            left_rest = tail;
        }
        if let Some(tail) = right_tail {
            right_rest = tail;
        }
    }

    if ordering != Ordering::Equal {
        return ordering;
    }

    if left_more {
        if starts_with_digit(left_rest) {
            Ordering::Greater
        } else {
            compare_versions(left_rest, NUMBER_FORM)
        }
    } else if right_more {
        if starts_with_digit(right_rest) {
            Ordering::Less
        } else {
            compare_versions(NUMBER_FORM, right_rest)
        }
    } else {
        Ordering::Equal
    }
}

fn split_part(version: &str) -> (&str, Option<&str>) {
    match version.split_once('.') {
        Some((part, tail)) => (part, Some(tail)),
        None => (version, None),
    }
}

fn compare_parts(left: &str, right: &str) -> Ordering {
    match (starts_with_digit(left), starts_with_digit(right)) {
        (true, true) => leading_number(left).cmp(&leading_number(right)),
        (false, false) => special_rank(left).cmp(&special_rank(right)),
        (true, false) => special_rank(NUMBER_FORM).cmp(&special_rank(right)),
        (false, true) => special_rank(left).cmp(&special_rank(NUMBER_FORM)),
    }
}

fn starts_with_digit(part: &str) -> bool {
    part.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

fn leading_number(part: &str) -> u64 {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().unwrap_or(u64::MAX)
}

fn special_rank(part: &str) -> i32 {
    SPECIAL_FORMS
        .iter()
        .find(|(form, _)| part.starts_with(form))
        .map(|(_, rank)| *rank)
        .unwrap_or(-6)
}
