//! Prompt construction for each assistance kind

use super::context::MeetingContext;
use super::provider::{AnswerRequest, AssistKind};

fn role_line(context: &MeetingContext) -> String {
    let role = context.job_title.trim();
    let company = context.company_name.trim();
    match (role.is_empty(), company.is_empty()) {
        (false, false) => format!("a {} interview at {}", role, company),
        (false, true) => format!("a {} interview", role),
        (true, false) => format!("an interview at {}", company),
        (true, true) => "a job interview".to_string(),
    }
}

/// System instruction for `kind`, specialised with the interview context
pub fn system_prompt(kind: AssistKind, context: &MeetingContext) -> String {
    let mut prompt = format!(
        "You are a discreet interview coach helping a candidate during {}.\n",
        role_line(context)
    );

    prompt.push_str(match kind {
        AssistKind::Answer => {
            "Write the answer the candidate could give to the interviewer's question. \
             Speak in the first person, stay concise (under 150 words) and draw on the \
             candidate's resume where it is relevant."
        }
        AssistKind::CodeSample => {
            "Write a short, correct code sample that answers the interviewer's question, \
             in a single fenced code block, followed by at most three sentences explaining \
             the approach and its complexity."
        }
        AssistKind::Summary => {
            "Summarise the interviewer's question as bullet points: what is really being \
             asked, the points a strong answer must cover and any follow-up to expect."
        }
        AssistKind::Tips => {
            "Give three to five brief, practical tips for handling the interviewer's \
             question well, as a bulleted list."
        }
    });

    let details = context.describe();
    if !details.is_empty() {
        prompt.push_str("\n\n## Interview context\n\n");
        prompt.push_str(&details);
    }
    prompt
}

/// User turn: the single question being asked about
pub fn user_prompt(request: &AnswerRequest) -> String {
    format!("Interviewer's question: {}", request.question().unwrap_or_default())
}
