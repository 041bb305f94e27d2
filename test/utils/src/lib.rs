/// A successful `generateContent` payload holding a single candidate whose
/// text is split across the given parts.
pub fn gemini_response_body(parts: &[&str]) -> String {
    let parts = parts
        .iter()
        .map(|text| {
            return serde_json::json!({ "text": text });
        })
        .collect::<Vec<serde_json::Value>>();

    return serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": parts,
            },
            "finishReason": "STOP",
        }],
    })
    .to_string();
}

/// Error payload in the shape Google APIs return for failed requests.
pub fn gemini_error_body(code: u16, status: &str, message: &str) -> String {
    return serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "status": status,
        },
    })
    .to_string();
}
