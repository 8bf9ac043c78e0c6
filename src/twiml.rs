//! Telephony control document builders.
//!
//! Everything here emits the XML grammar the provider consumes verbatim:
//! `<Response>`, `<Start><Stream>`, `<Connect><Stream>`, `<Say>`, `<Gather>`,
//! `<Dial>`, `<Redirect>`, `<Hangup/>`. All interpolated strings are
//! XML-escaped via `quick_xml::escape::escape`.

use quick_xml::escape::escape;

const VOICE: &str = "Polly.Camila-Neural";
const LANGUAGE: &str = "pt-BR";

fn esc(s: &str) -> String {
    escape(s).into_owned()
}

/// A single `<Parameter name=.. value=../>` entry for a `<Stream>` block.
pub struct Param<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("<Parameter name=\"{}\" value=\"{}\"/>", esc(p.name), esc(p.value)))
        .collect()
}

/// `/connect-lead`'s success document: start the bidirectional media stream,
/// speak the announcement, then gather the SDR's confirmation speech. If the
/// SDR never speaks, `<Gather>` falls through to a trailing `<Redirect>` that
/// sends the call to `/verify-sdr` with a `speech_result=timeout` marker, so
/// the no-input path still resolves a (empty) transcript instead of hanging.
pub fn connect_lead_document(stream_url: &str, params: &[Param], announcement: &str, verify_action: &str, no_speech_redirect: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
<Start><Stream url=\"{stream_url}\" track=\"both_tracks\">{params}</Stream></Start>\
<Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">{announcement}</Say>\
<Gather input=\"speech\" timeout=\"3\" speechTimeout=\"2\" language=\"{LANGUAGE}\" action=\"{action}\" method=\"POST\">\
<Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">Diga algo para confirmar</Say>\
</Gather>\
{redirect}\
</Response>",
        stream_url = esc(stream_url),
        params = render_params(params),
        announcement = esc(announcement),
        action = esc(verify_action),
        redirect = redirect_document(no_speech_redirect),
    )
}

/// Machine/fax answer, or any other path that must hang up with a spoken
/// notice first.
pub fn say_then_hangup_document(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
<Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">{message}</Say><Hangup/></Response>",
        message = esc(message),
    )
}

pub fn hangup_document() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Hangup/></Response>".to_string()
}

/// A bare `<Redirect>` verb, for embedding inside another document's
/// `<Response>` (Twilio falls through to the next verb in the same document
/// rather than re-requesting a standalone one, so this is never a top-level
/// document by itself).
pub fn redirect_document(url: &str) -> String {
    format!("<Redirect>{}</Redirect>", esc(url))
}

/// `/verify-sdr`'s success document: announce the handoff, then dial the
/// lead. Recording continues uninterrupted from `/connect-lead`.
pub fn say_then_dial_document(message: &str, caller_id: &str, lead_phone: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
<Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">{message}</Say>\
<Dial callerId=\"{caller_id}\" timeout=\"30\">{lead_phone}</Dial>\
</Response>",
        message = esc(message),
        caller_id = esc(caller_id),
        lead_phone = esc(lead_phone),
    )
}

/// `/incoming` and `/`: a direct two-party stream to the LLM voice agent.
pub fn connect_stream_document(stream_url: &str, params: &[Param]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
<Connect><Stream url=\"{stream_url}\">{params}</Stream></Connect>\
</Response>",
        stream_url = esc(stream_url),
        params = render_params(params),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolated_strings_are_escaped() {
        let doc = say_then_hangup_document("Tom & Jerry \"quotes\"");
        assert!(doc.contains("Tom &amp; Jerry"));
        assert!(!doc.contains("Tom & Jerry"));
    }

    #[test]
    fn connect_lead_document_includes_stream_and_gather() {
        let params = [Param { name: "lead_name", value: "Maria" }];
        let doc = connect_lead_document("wss://example/media", &params, "Novo lead: Maria", "/verify-sdr", "/verify-sdr?speech_result=timeout");
        assert!(doc.contains("<Start><Stream"));
        assert!(doc.contains("track=\"both_tracks\""));
        assert!(doc.contains("name=\"lead_name\" value=\"Maria\""));
        assert!(doc.contains("<Gather"));
        assert!(doc.contains("action=\"/verify-sdr\""));
    }

    #[test]
    fn connect_lead_document_redirects_to_verify_sdr_on_no_speech() {
        let doc = connect_lead_document("wss://example/media", &[], "Novo lead: Maria", "/verify-sdr", "/verify-sdr?speech_result=timeout");
        let gather_end = doc.find("</Gather>").expect("document has a Gather close tag");
        let redirect_pos = doc.find("<Redirect>/verify-sdr?speech_result=timeout</Redirect>").expect("document has the no-speech redirect");
        assert!(redirect_pos > gather_end, "redirect must follow the Gather block");
    }

    #[test]
    fn say_then_dial_document_dials_the_lead() {
        let doc = say_then_dial_document("Conectando com o lead agora", "+15551234567", "+5511999998888");
        assert!(doc.contains("<Dial callerId=\"+15551234567\" timeout=\"30\">+5511999998888</Dial>"));
    }
}
