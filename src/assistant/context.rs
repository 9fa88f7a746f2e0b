use serde::{Deserialize, Serialize};

/// The interview the user is preparing for. Read-only once a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingContext {
    pub job_title: String,
    pub company_name: String,
    pub job_description: String,
    /// e.g. "technical", "behavioral", "system design"
    pub meeting_type: String,
    pub resume_text: String,
    pub key_skills: Option<Vec<String>>,
}

impl MeetingContext {
    /// True when nothing has been filled in
    pub fn is_blank(&self) -> bool {
        self.job_title.trim().is_empty()
            && self.company_name.trim().is_empty()
            && self.job_description.trim().is_empty()
            && self.meeting_type.trim().is_empty()
            && self.resume_text.trim().is_empty()
            && self.skills().is_empty()
    }

    /// Non-blank skills, trimmed
    pub fn skills(&self) -> Vec<&str> {
        self.key_skills
            .iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Labelled block of the non-empty fields, one per line
    pub fn describe(&self) -> String {
        let skills = self.skills().join(", ");
        let fields = [
            ("Role", self.job_title.trim()),
            ("Company", self.company_name.trim()),
            ("Interview type", self.meeting_type.trim()),
            ("Key skills", skills.as_str()),
            ("Job description", self.job_description.trim()),
            ("Candidate resume", self.resume_text.trim()),
        ];

        fields
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_skips_empty_fields() {
        let ctx = MeetingContext {
            job_title: "Data Engineer".to_string(),
            company_name: "  ".to_string(),
            key_skills: Some(vec!["Spark".to_string(), " ".to_string(), "SQL".to_string()]),
            ..Default::default()
        };
        assert_eq!(ctx.describe(), "Role: Data Engineer\nKey skills: Spark, SQL");
        assert!(!ctx.is_blank());
        assert!(MeetingContext::default().is_blank());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let ctx: MeetingContext = serde_json::from_str(
            r#"{"jobTitle":"SRE","companyName":"Initech","keySkills":["Linux"]}"#,
        ).unwrap();
        assert_eq!(ctx.job_title, "SRE");
        assert_eq!(ctx.company_name, "Initech");
        assert_eq!(ctx.skills(), vec!["Linux"]);
        assert!(ctx.resume_text.is_empty());
    }
}
