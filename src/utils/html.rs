use ammonia;

/// Clean client-supplied rich text using the ammonia library.
///
/// Uploaded extracted text and certificate titles pass through here before
/// storage. Whitelist-based: safe tags (<b>, <p>) survive, <script>/<iframe>
/// and event-handler attributes are stripped. Fail-safe against stored XSS
/// reaching the admin panel or other clients.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
