use schemars::JsonSchema;
use serde::Deserialize;

/// One edit of the text field.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TextChangedRequest {
    /// Full current contents of the field after the edit
    pub text: String,
}

/// Request a suggestion immediately, bypassing the debounce timer.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestRequest {
    /// Text to continue
    pub text: String,
}
