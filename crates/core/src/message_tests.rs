// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn token_usage_total_sums_all_categories() {
    let usage = TokenUsage {
        input_tokens: 100,
        cache_creation_tokens: 10,
        cache_read_tokens: 20,
        output_tokens: 50,
    };
    assert_eq!(usage.total(), 180);
}

#[test]
fn token_usage_add_accumulates() {
    let mut a = TokenUsage {
        input_tokens: 1,
        cache_creation_tokens: 2,
        cache_read_tokens: 3,
        output_tokens: 4,
    };
    a.add(&TokenUsage {
        input_tokens: 10,
        cache_creation_tokens: 20,
        cache_read_tokens: 30,
        output_tokens: 40,
    });
    assert_eq!(a.input_tokens, 11);
    assert_eq!(a.cache_creation_tokens, 22);
    assert_eq!(a.cache_read_tokens, 33);
    assert_eq!(a.output_tokens, 44);
}

#[test]
fn role_parse_rejects_unknown() {
    assert_eq!(Role::parse("user"), Some(Role::User));
    assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
    assert_eq!(Role::parse("summary"), Some(Role::Summary));
    assert_eq!(Role::parse("system"), None);
}

#[test]
fn role_display_roundtrips() {
    for role in [Role::User, Role::Assistant, Role::Summary] {
        assert_eq!(Role::parse(&role.to_string()), Some(role));
    }
}
