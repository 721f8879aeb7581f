use crate::catalog::Catalog;
use crate::models::{Answer, AnswerStore, Question, QuestionType, ScoringRule};

pub const COUNTRY_POINTS: i64 = 3;
pub const OTHER_COUNTRY: &str = "Other";

/// Points earned by a single answer. Absent or empty answers score nothing.
pub fn score_question(question: &Question, answer: Option<&Answer>) -> i64 {
    let Some(answer) = answer.filter(|a| !a.is_empty()) else {
        return 0;
    };
    match &question.rule {
        ScoringRule::FlatPoints(points) => *points,
        ScoringRule::Mapping(table) => {
            let Some(value) = answer.as_scalar() else {
                return 0;
            };
            let key = if question.kind == QuestionType::YesNo {
                value.to_lowercase()
            } else {
                value.into_owned()
            };
            table.get(&key).copied().unwrap_or(0)
        }
        ScoringRule::Country => country_points(question, answer),
        ScoringRule::Age => answer.as_scalar().and_then(|v| parse_int(&v)).map_or(0, age_points),
        ScoringRule::Language => answer
            .as_scalar()
            .and_then(|v| parse_int(&v))
            .map_or(0, language_points),
        ScoringRule::None => 0,
    }
}

/// Sum over every catalog question. Order does not matter.
pub fn score_all(catalog: &Catalog, answers: &AnswerStore) -> i64 {
    catalog
        .questions()
        .iter()
        .map(|q| score_question(q, answers.get(q.id)))
        .sum()
}

/// Best score a question can award, used to cross-check the catalog's declared maximum.
pub fn max_points(question: &Question) -> i64 {
    match &question.rule {
        ScoringRule::FlatPoints(points) => *points,
        ScoringRule::Mapping(table) => table.values().copied().max().unwrap_or(0).max(0),
        ScoringRule::Country => COUNTRY_POINTS,
        ScoringRule::Age | ScoringRule::Language => 2,
        ScoringRule::None => 0,
    }
}

pub fn age_points(age: i64) -> i64 {
    match age {
        18..=30 => 2,
        31..=50 => 1,
        _ => 0,
    }
}

pub fn language_points(score: i64) -> i64 {
    match score {
        10 => 2,
        7..=9 => 1,
        _ => 0,
    }
}

fn country_points(question: &Question, answer: &Answer) -> i64 {
    let Some(country) = answer.as_scalar() else {
        return 0;
    };
    if country == OTHER_COUNTRY {
        0
    } else if question.options.iter().any(|o| *o == country) {
        COUNTRY_POINTS
    } else {
        0
    }
}

/// Leading base-10 integer of `text`: surrounding whitespace and trailing garbage are ignored,
/// so `" 25 years"` reads as 25 and `"25.9"` as 25. `None` when no digit leads the text.
pub fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompoundName, QuestionRecord, SpecialRule};
    use std::collections::BTreeMap;

    fn question(kind: &str) -> QuestionRecord {
        QuestionRecord {
            id: 1,
            question: "?".into(),
            kind: QuestionType::from(kind.to_string()),
            options: None,
            points: None,
            points_mapping: None,
            rule: None,
            profile_label: None,
            require_complete: false,
        }
    }

    fn with_rule(kind: &str, rule: SpecialRule) -> Question {
        let mut record = question(kind);
        record.rule = Some(rule);
        if rule == SpecialRule::Country {
            record.options = Some(vec!["Canada".into(), "Chile".into(), "Other".into()]);
        }
        Question::from_record(record)
    }

    fn text(value: &str) -> Answer {
        Answer::Text(value.into())
    }

    #[test]
    fn flat_points_saturate() {
        let mut record = question("text");
        record.points = Some(3);
        let q = Question::from_record(record);
        assert_eq!(score_question(&q, Some(&text("anything at all"))), 3);
        assert_eq!(score_question(&q, Some(&text("x"))), 3);
        assert_eq!(score_question(&q, Some(&text(""))), 0);
        assert_eq!(score_question(&q, None), 0);

        let mut record = question("compound");
        record.points = Some(1);
        let q = Question::from_record(record);
        let partial = Answer::Compound(CompoundName {
            surname: Some("Doe".into()),
            ..Default::default()
        });
        assert_eq!(score_question(&q, Some(&partial)), 1);
    }

    #[test]
    fn age_boundaries() {
        let q = with_rule("number", SpecialRule::Age);
        let cases = [("17", 0), ("18", 2), ("30", 2), ("31", 1), ("50", 1), ("51", 0), ("abc", 0)];
        for (answer, expected) in cases {
            assert_eq!(score_question(&q, Some(&text(answer))), expected, "age {answer}");
        }
        assert_eq!(score_question(&q, Some(&Answer::Number(25.0))), 2);
        assert_eq!(score_question(&q, Some(&text("45 years"))), 1);
    }

    #[test]
    fn language_boundaries() {
        let q = with_rule("number", SpecialRule::Language);
        let cases = [("6", 0), ("7", 1), ("9", 1), ("10", 2), ("11", 0), ("", 0), ("ten", 0)];
        for (answer, expected) in cases {
            assert_eq!(score_question(&q, Some(&text(answer))), expected, "score {answer}");
        }
    }

    #[test]
    fn country_scoring() {
        let q = with_rule("dropdown", SpecialRule::Country);
        assert_eq!(score_question(&q, Some(&text("Canada"))), 3);
        assert_eq!(score_question(&q, Some(&text("Other"))), 0);
        assert_eq!(score_question(&q, Some(&text("Atlantis"))), 0);
        assert_eq!(score_question(&q, Some(&text("canada"))), 0);
    }

    #[test]
    fn dropdown_mapping_is_verbatim() {
        let mut record = question("dropdown");
        record.options = Some(vec!["France".into(), "Germany".into()]);
        record.points_mapping = Some(BTreeMap::from([("France".to_string(), 3)]));
        let q = Question::from_record(record);
        assert_eq!(score_question(&q, Some(&text("France"))), 3);
        assert_eq!(score_question(&q, Some(&text("Germany"))), 0);
        assert_eq!(score_question(&q, Some(&text("france"))), 0);
    }

    #[test]
    fn yesno_mapping_folds_case() {
        let mut record = question("yesno");
        record.points_mapping = Some(BTreeMap::from([("yes".to_string(), 2), ("no".to_string(), 0)]));
        let q = Question::from_record(record);
        assert_eq!(score_question(&q, Some(&text("Yes"))), 2);
        assert_eq!(score_question(&q, Some(&text("YES"))), 2);
        assert_eq!(score_question(&q, Some(&text("no"))), 0);
        assert_eq!(score_question(&q, Some(&text("maybe"))), 0);
    }

    #[test]
    fn unresolved_rule_scores_zero() {
        let q = Question::from_record(question("date"));
        assert_eq!(score_question(&q, Some(&text("2024-01-01"))), 0);
        let q = Question::from_record(question("hologram"));
        assert_eq!(score_question(&q, Some(&text("x"))), 0);
    }

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("  42abc"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("25.9"), Some(25));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("99999999999999999999999"), Some(i64::MAX));
    }
}
