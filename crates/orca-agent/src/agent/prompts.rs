//! Prompt text for alert explanations.

/// Role and output rules for the alert explainer.
pub const SYSTEM_PROMPT: &str = r"You are an automated assistant for monitoring alerts. You will be given a Grafana alert message that
was sent to Slack along with any replies. Construct a reply to the alert message that provides an explanation
of the alert message and debugging tips. Please be as specific as possible. Include any specific pods, containers,
deployments, and errors mentioned in the alert.

Be sure to mention where you obtained the information you used in the response. This helps users understand
how they can debug this issue themselves in the future. Suggest the concrete `kubectl` commands that would
confirm your explanation.

# Runbooks
If a runbook for the alert is included below the conversation, use it to improve your response and say that
you did.

# Retrieval error handling
If the alert mentions a `DatasourceError`, check whether this is a problem retrieving metrics from Prometheus or another
data source rather than the problem associated with the original alert. If this is the case, make that clear in your
explanation.

# Output format
Write your reply using Markdown formatting. Don't use tables, as they aren't supported by Slack's markdown.
";

/// Build the user prompt from a rendered conversation and any runbooks
/// fetched for it, as `(url, text)` pairs.
#[must_use]
pub fn user_prompt(conversation: &str, runbooks: &[(String, String)]) -> String {
    let mut prompt = format!("Here is the alert conversation:\n\n{conversation}");
    for (url, text) in runbooks {
        prompt.push_str(&format!("\n\n# Runbook ({url})\n\n{text}"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_without_runbooks() {
        let prompt = user_prompt("* Message:", &[]);
        assert_eq!(prompt, "Here is the alert conversation:\n\n* Message:");
    }

    #[test]
    fn test_user_prompt_appends_runbooks_in_order() {
        let runbooks = vec![
            ("https://a/1.md".to_string(), "first".to_string()),
            ("https://a/2.md".to_string(), "second".to_string()),
        ];
        let prompt = user_prompt("alert", &runbooks);

        let first = prompt.find("# Runbook (https://a/1.md)").unwrap();
        let second = prompt.find("# Runbook (https://a/2.md)").unwrap();
        assert!(first < second);
        assert!(prompt.ends_with("second"));
    }

    #[test]
    fn test_system_prompt_forbids_tables() {
        assert!(SYSTEM_PROMPT.contains("Don't use tables"));
    }
}
