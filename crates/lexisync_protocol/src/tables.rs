//! Names of the synchronizable tables as they appear on the wire.

/// Words the user is currently learning.
pub const LEARNING_WORD: &str = "learning_word";
/// Dictionaries the user has selected for study.
pub const LEARNING_DICT: &str = "learning_dict";
/// Per-user study step configuration.
pub const USER_STUDY_STEP: &str = "user_study_step";
/// Daily check-ins.
pub const DAKA: &str = "daka";
/// Append-only user operation history.
pub const USER_OPER: &str = "user_oper";
/// Words the user answered wrongly.
pub const USER_WRONG_WORD: &str = "user_wrong_word";
/// Dictionary membership of a word (ordered by `seq`).
pub const DICT_WORD: &str = "dict_word";
/// Words the user has mastered.
pub const MASTERED_WORD: &str = "mastered_word";
/// Append-only currency ledger.
pub const USER_COW_DUNG_LOG: &str = "user_cow_dung_log";
/// User-owned dictionaries.
pub const DICT: &str = "dict";
/// The user profile row.
pub const USER: &str = "user";

/// Every synchronizable table, in full-reconstruction order.
///
/// Dictionaries come before their memberships so that a client replaying a
/// full reconstruction never sees a `dict_word` whose dictionary is missing.
pub const ALL: [&str; 11] = [
    USER,
    DICT,
    LEARNING_DICT,
    LEARNING_WORD,
    USER_STUDY_STEP,
    DAKA,
    USER_OPER,
    USER_WRONG_WORD,
    DICT_WORD,
    MASTERED_WORD,
    USER_COW_DUNG_LOG,
];

/// Normalizes a client-supplied table name.
pub fn normalize(table: &str) -> String {
    table.trim().to_ascii_lowercase()
}

/// Returns true if `table` names a synchronizable table.
pub fn is_known(table: &str) -> bool {
    ALL.contains(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases() {
        assert_eq!(normalize(" Learning_Word "), LEARNING_WORD);
        assert!(is_known(&normalize("DAKA")));
        assert!(!is_known("book_mark"));
    }

    #[test]
    fn dict_precedes_membership() {
        let dict = ALL.iter().position(|t| *t == DICT).unwrap();
        let member = ALL.iter().position(|t| *t == DICT_WORD).unwrap();
        assert!(dict < member);
    }
}
