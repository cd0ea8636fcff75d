//! Init command presentation.

use crate::init::InitResult;

pub fn format_init_result(result: &InitResult) -> String {
    if result.created {
        format!(
            "Wrote default configuration to {}\n\nSet OPENAI_API_KEY (or edit [provider]) and a Google access token, then run:\n  flowsheet create \"<describe your process>\"",
            result.path.display()
        )
    } else {
        format!(
            "Configuration already exists at {}\nUse --force to overwrite it.",
            result.path.display()
        )
    }
}
