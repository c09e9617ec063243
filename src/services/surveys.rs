use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::consts::SHARE_URL_ATTEMPTS;
use crate::errors::{Error, Result};
use crate::models::{
    permission::SurveyAccess,
    question::{Question, QuestionKind},
    response::{Answer, AnswerValue, SurveyResponse},
    survey::{Survey, SurveyListItem, SurveyStatus},
};
use crate::services::tickets;
use crate::store::Store;
use crate::utils::token::{new_id, share_code};

const MAX_OPTIONS: usize = 50;
const RATING_SCALES: std::ops::RangeInclusive<u8> = 2..=10;

/// Creates a DRAFT survey paid for with one ticket. The consumed ticket is
/// released again when the insert fails.
pub async fn create(
    store: &dyn Store,
    owner_id: &str,
    title: String,
    description: Option<String>,
) -> Result<Survey> {
    let ticket_type = tickets::consume_for_survey(store, owner_id).await?;

    let survey = Survey {
        id: new_id(),
        owner_id: owner_id.to_string(),
        title,
        description,
        status: SurveyStatus::Draft,
        share_url: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    match store.insert_survey(survey).await {
        Ok(survey) => {
            info!(
                "Survey {} created by {owner_id} with a {} ticket",
                survey.id,
                ticket_type.as_str()
            );
            Ok(survey)
        }
        Err(e) => {
            warn!("Survey insert failed for {owner_id}, returning the {} ticket", ticket_type.as_str());
            if let Err(refund) = store.release_tickets(owner_id, ticket_type, 1).await {
                error!("Ticket refund for {owner_id} failed: {refund}");
            }
            Err(e)
        }
    }
}

/// Owned surveys followed by the ones shared with the user.
pub async fn list_for_user(store: &dyn Store, user_id: &str) -> Result<Vec<SurveyListItem>> {
    let owned = store.list_owned_surveys(user_id).await?;
    let shared = store.list_shared_surveys(user_id).await?;

    let mut items: Vec<SurveyListItem> = owned
        .into_iter()
        .map(|survey| SurveyListItem {
            access: SurveyAccess::resolve(user_id, &survey, None),
            survey,
        })
        .collect();
    items.extend(shared.into_iter().map(|(survey, grant)| SurveyListItem {
        access: SurveyAccess::resolve(user_id, &survey, Some(&grant)),
        survey,
    }));
    Ok(items)
}

/// Publishes the survey under a fresh share code. Sharing an ACTIVE survey
/// again returns it unchanged.
pub async fn share(store: &dyn Store, survey: Survey) -> Result<Survey> {
    if survey.status == SurveyStatus::Active && survey.share_url.is_some() {
        return Ok(survey);
    }

    for attempt in 1..=SHARE_URL_ATTEMPTS {
        match store
            .set_survey_share(&survey.id, Some(share_code()), Utc::now())
            .await
        {
            Ok(shared) => {
                info!("Survey {} shared", shared.id);
                return Ok(shared);
            }
            Err(Error::ShareUrlTaken) => {
                warn!("Share code collision for survey {} (attempt {attempt})", survey.id);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::ShareUrlTaken)
}

pub async fn unshare(store: &dyn Store, survey: Survey) -> Result<Survey> {
    let survey = store.set_survey_share(&survey.id, None, Utc::now()).await?;
    info!("Survey {} unshared", survey.id);
    Ok(survey)
}

/// The ACTIVE survey behind a public share code, with its questions.
pub async fn public_view(store: &dyn Store, share_url: &str) -> Result<(Survey, Vec<Question>)> {
    let survey = store
        .find_survey_by_share_url(share_url)
        .await?
        .filter(|survey| survey.status == SurveyStatus::Active)
        .ok_or(Error::NotFound)?;
    let questions = store.list_questions(&survey.id).await?;
    Ok((survey, questions))
}

pub async fn submit_response(
    store: &dyn Store,
    share_url: &str,
    answers: Vec<Answer>,
) -> Result<SurveyResponse> {
    let (survey, questions) = public_view(store, share_url).await?;
    validate_answers(&questions, &answers)?;

    let response = SurveyResponse {
        id: new_id(),
        survey_id: survey.id,
        answers,
        submitted_at: Utc::now(),
    };
    store.insert_response(response).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Checks question definitions and numbers them in submission order.
pub fn build_questions(survey_id: &str, inputs: Vec<QuestionInput>) -> Result<Vec<Question>> {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen_ids = HashSet::new();
    let mut questions = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.into_iter().enumerate() {
        let id = input.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_id);
        let key = format!("questions[{index}]");
        let mut problems = Vec::new();

        if !seen_ids.insert(id.clone()) {
            problems.push("duplicate question id".to_string());
        }
        if input.title.trim().is_empty() {
            problems.push("title must not be blank".to_string());
        }
        match &input.kind {
            QuestionKind::SingleChoice { options } => check_options(options, &mut problems),
            QuestionKind::MultipleChoice {
                options,
                max_selections,
            } => {
                check_options(options, &mut problems);
                if max_selections.is_some_and(|max| max == 0 || max as usize > options.len()) {
                    problems.push("max_selections must be between 1 and the option count".to_string());
                }
            }
            QuestionKind::Rating { scale } if !RATING_SCALES.contains(scale) => {
                problems.push("rating scale must be between 2 and 10".to_string());
            }
            QuestionKind::ShortText { max_length } | QuestionKind::LongText { max_length }
                if *max_length == Some(0) =>
            {
                problems.push("max_length must be positive".to_string());
            }
            _ => {}
        }

        if !problems.is_empty() {
            errors.insert(key, problems);
            continue;
        }
        questions.push(Question {
            id,
            survey_id: survey_id.to_string(),
            order: index as u32,
            title: input.title.trim().to_string(),
            description: input.description,
            required: input.required,
            kind: input.kind,
        });
    }

    if errors.is_empty() {
        Ok(questions)
    } else {
        Err(Error::InvalidFields(errors))
    }
}

fn check_options(options: &[String], problems: &mut Vec<String>) {
    if options.is_empty() || options.len() > MAX_OPTIONS {
        problems.push(format!("between 1 and {MAX_OPTIONS} options required"));
    }
    let distinct: HashSet<&str> = options.iter().map(|o| o.trim()).collect();
    if distinct.len() != options.len() || distinct.contains("") {
        problems.push("options must be distinct and non-blank".to_string());
    }
}

/// Checks a submission against the survey's questions. Errors are keyed by
/// question id.
pub fn validate_answers(questions: &[Question], answers: &[Answer]) -> Result<()> {
    let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut answered: HashMap<&str, &AnswerValue> = HashMap::new();

    for answer in answers {
        let id = answer.question_id.as_str();
        if !by_id.contains_key(id) {
            errors.entry(id.to_string()).or_default().push("unknown question".to_string());
        } else if answered.insert(id, &answer.value).is_some() {
            errors
                .entry(id.to_string())
                .or_default()
                .push("answered more than once".to_string());
        }
    }

    for question in questions {
        let problem = match answered.get(question.id.as_str()) {
            None if question.required => Some("answer required".to_string()),
            None => None,
            Some(value) => check_answer(question, value),
        };
        if let Some(problem) = problem {
            errors.entry(question.id.clone()).or_default().push(problem);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidFields(errors))
    }
}

fn check_answer(question: &Question, value: &AnswerValue) -> Option<String> {
    match (&question.kind, value) {
        (QuestionKind::ShortText { .. } | QuestionKind::LongText { .. }, AnswerValue::Text(text)) => {
            let limit = question.kind.text_limit().unwrap_or(u32::MAX) as usize;
            if question.required && text.trim().is_empty() {
                Some("answer required".to_string())
            } else if text.chars().count() > limit {
                Some(format!("at most {limit} characters"))
            } else {
                None
            }
        }
        (QuestionKind::SingleChoice { options }, AnswerValue::Text(choice)) => {
            (!options.contains(choice)).then(|| "not one of the options".to_string())
        }
        (
            QuestionKind::MultipleChoice {
                options,
                max_selections,
            },
            AnswerValue::Choices(choices),
        ) => {
            let distinct: HashSet<&String> = choices.iter().collect();
            if question.required && choices.is_empty() {
                Some("answer required".to_string())
            } else if choices.iter().any(|c| !options.contains(c)) {
                Some("not one of the options".to_string())
            } else if distinct.len() != choices.len() {
                Some("option selected more than once".to_string())
            } else if max_selections.is_some_and(|max| choices.len() > max as usize) {
                Some("too many selections".to_string())
            } else {
                None
            }
        }
        (QuestionKind::Rating { scale }, AnswerValue::Number(rating)) => {
            (!(1..=i64::from(*scale)).contains(rating))
                .then(|| format!("rating must be between 1 and {scale}"))
        }
        _ => Some("answer has the wrong type".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticket::TicketType;
    use crate::store::{Fault, MemoryStore};

    fn question(id: &str, required: bool, kind: QuestionKind) -> Question {
        Question {
            id: id.to_string(),
            survey_id: "s".to_string(),
            order: 0,
            title: id.to_string(),
            description: None,
            required,
            kind,
        }
    }

    fn answer(id: &str, value: AnswerValue) -> Answer {
        Answer {
            question_id: id.to_string(),
            value,
        }
    }

    fn field_errors(result: Result<()>) -> BTreeMap<String, Vec<String>> {
        match result {
            Err(Error::InvalidFields(errors)) => errors,
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn creating_consumes_a_ticket() {
        let store = MemoryStore::new();
        let survey = create(&store, "u", "Pulse".to_string(), None).await.unwrap();
        assert_eq!(survey.status, SurveyStatus::Draft);

        let free = tickets::list(&store, "u").await.unwrap().remove(0);
        assert_eq!(free.remaining_tickets, 2);
    }

    #[tokio::test]
    async fn failed_insert_releases_the_ticket() {
        let store = MemoryStore::with_faults([Fault::SurveyInsert]);
        assert!(create(&store, "u", "Pulse".to_string(), None).await.is_err());

        let free = tickets::list(&store, "u").await.unwrap().remove(0);
        assert_eq!(free.ticket_type, TicketType::Free);
        assert_eq!(
            (free.total_tickets, free.used_tickets, free.remaining_tickets),
            (3, 0, 3)
        );
    }

    #[tokio::test]
    async fn share_is_idempotent_and_unshare_hides() {
        let store = MemoryStore::new();
        let survey = create(&store, "u", "Pulse".to_string(), None).await.unwrap();

        let shared = share(&store, survey).await.unwrap();
        let code = shared.share_url.clone().unwrap();
        assert_eq!(shared.status, SurveyStatus::Active);
        assert_eq!(code.len(), 12);

        let again = share(&store, shared.clone()).await.unwrap();
        assert_eq!(again.share_url.as_deref(), Some(code.as_str()));
        assert!(public_view(&store, &code).await.is_ok());

        let hidden = unshare(&store, again).await.unwrap();
        assert_eq!(hidden.status, SurveyStatus::Draft);
        assert!(hidden.share_url.is_none());
        assert!(matches!(
            public_view(&store, &code).await,
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn answers_are_checked_per_kind() {
        let questions = vec![
            question("name", true, QuestionKind::ShortText { max_length: Some(5) }),
            question(
                "color",
                false,
                QuestionKind::SingleChoice {
                    options: vec!["red".to_string(), "blue".to_string()],
                },
            ),
            question("score", true, QuestionKind::Rating { scale: 5 }),
        ];

        let ok = vec![
            answer("name", AnswerValue::Text("Ada".to_string())),
            answer("score", AnswerValue::Number(5)),
        ];
        assert!(validate_answers(&questions, &ok).is_ok());

        let errors = field_errors(validate_answers(
            &questions,
            &[
                answer("name", AnswerValue::Text("Adaline".to_string())),
                answer("color", AnswerValue::Text("green".to_string())),
                answer("extra", AnswerValue::Number(1)),
            ],
        ));
        assert_eq!(
            errors.keys().collect::<Vec<_>>(),
            vec!["color", "extra", "name", "score"]
        );
        assert_eq!(errors["score"], vec!["answer required".to_string()]);
    }

    #[test]
    fn multiple_choice_limits() {
        let questions = vec![question(
            "tags",
            true,
            QuestionKind::MultipleChoice {
                options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                max_selections: Some(2),
            },
        )];
        let pick = |values: &[&str]| {
            vec![answer(
                "tags",
                AnswerValue::Choices(values.iter().map(|v| v.to_string()).collect()),
            )]
        };
        assert!(validate_answers(&questions, &pick(&["a", "c"])).is_ok());
        assert!(validate_answers(&questions, &pick(&["a", "b", "c"])).is_err());
        assert!(validate_answers(&questions, &pick(&["a", "a"])).is_err());
        assert!(validate_answers(&questions, &pick(&[])).is_err());
    }

    #[test]
    fn question_definitions_are_checked() {
        let inputs = vec![
            QuestionInput {
                id: None,
                title: "How was it?".to_string(),
                description: None,
                required: true,
                kind: QuestionKind::Rating { scale: 5 },
            },
            QuestionInput {
                id: Some("q2".to_string()),
                title: " ".to_string(),
                description: None,
                required: false,
                kind: QuestionKind::SingleChoice { options: vec![] },
            },
        ];
        let errors = match build_questions("s", inputs) {
            Err(Error::InvalidFields(errors)) => errors,
            other => panic!("expected field errors, got {other:?}"),
        };
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["questions[1]"]);
        assert_eq!(errors["questions[1]"].len(), 2);
    }
}
