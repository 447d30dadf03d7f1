#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::models::SubmissionFields;
    use crate::test::test_utils::jane_doe;
    use crate::validation::validate_fields;

    fn with(edit: impl FnOnce(&mut SubmissionFields)) -> SubmissionFields {
        let mut fields = jane_doe();
        edit(&mut fields);
        fields.normalized()
    }

    #[test]
    fn test_complete_form_is_accepted() {
        assert!(validate_fields(&jane_doe()).is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported_by_name() {
        let cases: [(fn(&mut SubmissionFields), &str); 4] = [
            (|f| f.student_name.clear(), "student_name"),
            (|f| f.parent_name.clear(), "parent_name"),
            (|f| f.wa_number.clear(), "wa_number"),
            (|f| f.email.clear(), "email"),
        ];

        for (edit, expected) in cases {
            match validate_fields(&with(edit)) {
                Err(AppError::MissingField(field)) => assert_eq!(field, expected),
                other => panic!("Expected MissingField({}), got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_whitespace_only_counts_as_missing() {
        let fields = with(|f| f.parent_name = "   \t ".to_string());
        assert!(matches!(
            validate_fields(&fields),
            Err(AppError::MissingField(field)) if field == "parent_name"
        ));
    }

    #[test]
    fn test_missing_field_wins_over_format_errors() {
        let fields = with(|f| {
            f.student_name.clear();
            f.wa_number = "12345".to_string();
            f.email = "not-an-email".to_string();
        });
        assert!(matches!(
            validate_fields(&fields),
            Err(AppError::MissingField(field)) if field == "student_name"
        ));
    }

    #[test]
    fn test_phone_numbers() {
        for valid in ["+628123456789", "628123456789", "123456789", "+1123456789012345"] {
            let fields = with(|f| f.wa_number = valid.to_string());
            assert!(validate_fields(&fields).is_ok(), "{} should be accepted", valid);
        }

        for invalid in ["12345", "+62-812-3456", "0812 3456 789", "phone123456789", "1234567890123456789"] {
            let fields = with(|f| f.wa_number = invalid.to_string());
            assert!(
                matches!(validate_fields(&fields), Err(AppError::InvalidPhone)),
                "{} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_phone_is_checked_before_email() {
        let fields = with(|f| {
            f.wa_number = "12345".to_string();
            f.email = "no-at-sign".to_string();
        });
        assert!(matches!(validate_fields(&fields), Err(AppError::InvalidPhone)));
    }

    #[test]
    fn test_email_addresses() {
        for valid in ["john@example.com", "a.b@c.co.id", "x+tag@mail.example.org"] {
            let fields = with(|f| f.email = valid.to_string());
            assert!(validate_fields(&fields).is_ok(), "{} should be accepted", valid);
        }

        for invalid in ["john.example.com", "john@example", "john@@example.com", "@example.com"] {
            let fields = with(|f| f.email = invalid.to_string());
            assert!(
                matches!(validate_fields(&fields), Err(AppError::InvalidEmail)),
                "{} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed_before_checks() {
        let fields = with(|f| {
            f.wa_number = "  +628123456789 ".to_string();
            f.email = " john@example.com\n".to_string();
        });
        assert_eq!(fields.wa_number, "+628123456789");
        assert!(validate_fields(&fields).is_ok());
    }
}
