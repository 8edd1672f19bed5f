//! Pure input rules for polls and votes.
//!
//! Each check is a plain function over already-deserialized input, so the
//! order in which rules fire (and therefore which error a caller sees) is
//! fixed here and testable without a store or an HTTP stack.

use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{OptionId, PollChanges, PollType, Visibility, TRUE_FALSE_OPTIONS},
};

pub const MAX_QUESTION_LEN: usize = 500;
pub const MAX_OPTION_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct OptionInput {
    pub text: String,
}

/// Poll creation payload as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub poll_type: PollType,
    pub duration: i64,
    #[serde(default)]
    pub result_visibility: Visibility,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPoll {
    pub question: String,
    pub poll_type: PollType,
    pub duration: i32,
    pub result_visibility: Visibility,
    /// The option texts to persist, already materialized for the poll type.
    pub options: Vec<String>,
}

/// Partial poll update. Any field left out is unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollUpdate {
    pub question: Option<String>,
    pub poll_type: Option<PollType>,
    pub duration: Option<i64>,
    pub result_visibility: Option<Visibility>,
    pub options: Option<Vec<OptionInput>>,
}

/// Vote payload as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ballot {
    pub option: Option<OptionId>,
    pub comment: Option<String>,
}

/// A ballot whose shape matches its poll type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Option(OptionId),
    Comment(String),
}

pub fn validate_question(question: &str) -> AppResult<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::validation("Question cannot be blank."));
    }
    if question.chars().count() > MAX_QUESTION_LEN {
        return Err(AppError::validation(format!(
            "Question cannot exceed {MAX_QUESTION_LEN} characters."
        )));
    }
    Ok(question.to_string())
}

pub fn validate_duration(hours: i64) -> AppResult<i32> {
    if hours < 1 {
        return Err(AppError::validation("Duration must be at least 1 hour."));
    }
    i32::try_from(hours).map_err(|_| AppError::validation("Duration is too long."))
}

fn validate_option_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Option text cannot be blank."));
    }
    if text.chars().count() > MAX_OPTION_LEN {
        return Err(AppError::validation(format!(
            "Option text cannot exceed {MAX_OPTION_LEN} characters."
        )));
    }
    Ok(text.to_string())
}

/// Applies the per-type option count rule and returns the texts to store.
///
/// True/false polls accept either no options or exactly two, and always get
/// the fixed `True`/`False` pair regardless of what was sent.
pub fn options_for_type(poll_type: PollType, options: &[OptionInput]) -> AppResult<Vec<String>> {
    match poll_type {
        PollType::Mcq => {
            if options.len() < 2 {
                return Err(AppError::validation("MCQ Poll must have at least 2 options."));
            }
            options.iter().map(|o| validate_option_text(&o.text)).collect()
        }
        PollType::TrueFalse => {
            if !options.is_empty() && options.len() != 2 {
                return Err(AppError::validation(
                    "True/False polls must have exactly 2 options.",
                ));
            }
            Ok(TRUE_FALSE_OPTIONS.iter().map(|t| t.to_string()).collect())
        }
        PollType::Comment => {
            if !options.is_empty() {
                return Err(AppError::validation("Comment polls cannot have options."));
            }
            Ok(Vec::new())
        }
    }
}

pub fn validate_poll(draft: &PollDraft) -> AppResult<ValidatedPoll> {
    Ok(ValidatedPoll {
        question: validate_question(&draft.question)?,
        poll_type: draft.poll_type,
        duration: validate_duration(draft.duration)?,
        result_visibility: draft.result_visibility,
        options: options_for_type(draft.poll_type, &draft.options)?,
    })
}

/// Checks an update against the poll's fixed type. Returns the column
/// changes and, for MCQ polls, the replacement option set.
pub fn validate_update(
    poll_type: PollType,
    update: &PollUpdate,
) -> AppResult<(PollChanges, Option<Vec<String>>)> {
    if update.poll_type.is_some() {
        return Err(AppError::validation("Poll type cannot be changed."));
    }

    let changes = PollChanges {
        question: update.question.as_deref().map(validate_question).transpose()?,
        duration: update.duration.map(validate_duration).transpose()?,
        result_visibility: update.result_visibility,
    };

    let options = match (&update.options, poll_type) {
        (None, _) => None,
        (Some(options), PollType::Mcq) => Some(options_for_type(PollType::Mcq, options)?),
        (Some(_), _) => {
            return Err(AppError::validation(
                "Options can only be replaced on MCQ polls.",
            ))
        }
    };

    Ok((changes, options))
}

/// Matches a ballot against the poll type. Blank comments count as absent.
pub fn validate_ballot(poll_type: PollType, ballot: &Ballot) -> AppResult<Choice> {
    let comment = ballot
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    if poll_type.takes_option() {
        let Some(option) = ballot.option else {
            return Err(AppError::validation("Option is required for this poll type."));
        };
        if comment.is_some() {
            return Err(AppError::validation(
                "Comments are not allowed for this poll type.",
            ));
        }
        Ok(Choice::Option(option))
    } else {
        if ballot.option.is_some() {
            return Err(AppError::validation(
                "Options are not allowed for comment polls.",
            ));
        }
        match comment {
            Some(comment) => Ok(Choice::Comment(comment.to_string())),
            None => Err(AppError::validation("Comment is required for this poll type.")),
        }
    }
}
