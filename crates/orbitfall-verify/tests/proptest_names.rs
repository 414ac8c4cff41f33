//! Property tests for player-name admission.

use orbitfall_verify::prelude::*;
use proptest::prelude::*;

/// Characters drawn from every whitelisted range.
fn allowed_char() -> impl Strategy<Value = char> {
    prop_oneof![
        Just(' '),
        Just('\''),
        prop::char::range('0', '9'),
        prop::char::range('A', 'Z'),
        prop::char::range('a', 'z'),
        prop::char::range('\u{C0}', '\u{17F}'),
        prop::char::range('\u{400}', '\u{4FF}'),
    ]
}

proptest! {
    #[test]
    fn whitelisted_names_within_bounds_are_accepted(
        chars in prop::collection::vec(allowed_char(), MIN_PLAYER_NAME_LENGTH..=MAX_PLAYER_NAME_LENGTH),
    ) {
        let name: String = chars.into_iter().collect();
        prop_assume!(name.chars().any(|c| c != ' '));
        prop_assert_eq!(validate_player_name(&name), Ok(()));
    }

    #[test]
    fn any_foreign_character_is_reported(
        prefix in prop::collection::vec(allowed_char(), 0..6),
        bad in any::<char>().prop_filter("outside the whitelist", |c| {
            !is_valid_player_name_code_point(u32::from(*c))
        }),
    ) {
        let mut name: String = prefix.into_iter().collect();
        name.push(bad);
        prop_assert_eq!(validate_player_name(&name), Err(NameError::InvalidCharacter(bad)));
    }

    #[test]
    fn verdict_agrees_with_code_point_scan(name in "\\PC{0,20}") {
        let length = name.chars().count();
        let all_allowed = name.chars().all(|c| is_valid_player_name_code_point(u32::from(c)));
        let only_spaces = name.chars().all(|c| c == ' ');
        let expected = (MIN_PLAYER_NAME_LENGTH..=MAX_PLAYER_NAME_LENGTH).contains(&length)
            && all_allowed
            && !only_spaces;
        prop_assert_eq!(validate_player_name(&name).is_ok(), expected);
    }

    #[test]
    fn table_matching_ignores_case(name in "[a-zA-Z]{1,12}") {
        let mut table = NameTable::new();
        table.push(&name.to_uppercase(), NameAction::BlacklistExactMatch);
        prop_assert_eq!(table.check(&name.to_lowercase()), Err(NameError::NotAllowed));
    }
}
