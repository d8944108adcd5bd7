//! Location-page extraction.

use scraper::{ElementRef, Html, Selector};

/// Visible label of the portal's "go back" control.
///
/// Back controls are normally recognized by their action signature; this
/// literal only backstops the portal variant that styles the control as a
/// plain location button.
const BACK_LABEL: &str = "Torna indietro";

/// Split a location-selection page into available and unavailable venues.
///
/// Every `<button>` is a candidate. Back controls are skipped by action
/// signature (onclick / class), not by visible text, since the text is
/// localized copy that drifts. Presence of the `disabled` attribute is the
/// sole availability discriminant; entry text is whitespace-trimmed.
pub fn extract_locations(body: &str) -> (Vec<String>, Vec<String>) {
    let document = Html::parse_document(body);
    let Ok(buttons) = Selector::parse("button") else {
        return (Vec::new(), Vec::new());
    };

    let mut available = Vec::new();
    let mut unavailable = Vec::new();

    for button in document.select(&buttons) {
        if is_back_button(&button) {
            continue;
        }
        let text = button.text().collect::<String>().trim().to_string();
        if button.value().attr("disabled").is_some() {
            unavailable.push(text);
        } else {
            available.push(text);
        }
    }

    // A back control dressed as a location slips past the signature checks
    // on some pages; a result consisting only of it means "nothing
    // bookable", not one location.
    if unavailable.is_empty() && available.len() == 1 && available[0] == BACK_LABEL {
        available.clear();
    }

    (available, unavailable)
}

fn is_back_button(button: &ElementRef<'_>) -> bool {
    let onclick = button.value().attr("onclick").unwrap_or("");
    if onclick.contains("act_step(1)") || onclick.contains("sceglicorte") {
        return true;
    }
    button
        .value()
        .attr("class")
        .map_or(false, |classes| classes.split_whitespace().any(|c| c == "btn-back"))
}
