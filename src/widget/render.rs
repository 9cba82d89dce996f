//! Result cards and popups

use std::fmt::Write as _;

use serde::Serialize;

use crate::models::ClinicRecord;

pub const EMPTY_MESSAGE: &str = "No clinics found for that location or filters.";
pub const ERROR_MESSAGE: &str = "Error loading clinic data.";

const NOT_AVAILABLE: &str = "N/A";
const UNKNOWN_HOURS: &str = "Unknown";

/// Element id of the card at 0-based `index`
#[must_use]
pub fn card_id(index: usize) -> String {
    format!("clinic-{index}")
}

/// Popup summary for a clinic marker
#[must_use]
pub fn popup_html(clinic: &ClinicRecord) -> String {
    format!(
        "<b>{}</b><br>{}",
        escape(&clinic.name),
        escape(&clinic.address)
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// One entry of the result list, with every placeholder already applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicCard {
    pub id: String,
    /// 1-based position shown to the user
    pub number: usize,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub services: String,
    pub payment: String,
    pub hours: String,
    pub website: Option<Website>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Website {
    pub label: String,
    pub href: String,
}

impl ClinicCard {
    /// Card for the clinic at 0-based `index` in the result list
    #[must_use]
    pub fn new(index: usize, clinic: &ClinicRecord) -> Self {
        Self {
            id: card_id(index),
            number: index + 1,
            name: clinic.name.clone(),
            address: clinic.address.clone(),
            phone: clinic
                .phone
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            services: or_placeholder(&clinic.services_text(), NOT_AVAILABLE),
            payment: or_placeholder(&clinic.insurance_text(), NOT_AVAILABLE),
            hours: clinic
                .hours_label
                .clone()
                .unwrap_or_else(|| UNKNOWN_HOURS.to_string()),
            website: clinic.website_url().map(|href| Website {
                label: clinic.website.clone().unwrap_or_default(),
                href,
            }),
        }
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"card mb-2 p-3 clinic-card\" id=\"{}\">\
             <strong>{}. {}</strong><br>{}<br>\
             <strong>Phone:</strong> {}<br>\
             <strong>Services:</strong> {}<br>\
             <strong>Payment:</strong> {}<br>\
             <strong>Hours:</strong> {}<br>",
            self.id,
            self.number,
            escape(&self.name),
            escape(&self.address),
            escape(&self.phone),
            escape(&self.services),
            escape(&self.payment),
            escape(&self.hours),
        );
        if let Some(site) = &self.website {
            let _ = write!(
                html,
                "<strong>Website:</strong> <a href=\"{}\" target=\"_blank\" \
                 rel=\"noopener noreferrer\">{}</a><br>",
                escape(&site.href),
                escape(&site.label)
            );
        }
        html.push_str("</div>");
        html
    }
}

/// What the result list shows after a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cards", rename_all = "snake_case")]
pub enum ResultsView {
    Cards(Vec<ClinicCard>),
    Empty,
    Error,
}

impl ResultsView {
    #[must_use]
    pub fn from_results(clinics: &[ClinicRecord]) -> Self {
        if clinics.is_empty() {
            return Self::Empty;
        }
        Self::Cards(
            clinics
                .iter()
                .enumerate()
                .map(|(i, c)| ClinicCard::new(i, c))
                .collect(),
        )
    }

    #[must_use]
    pub fn cards(&self) -> &[ClinicCard] {
        match self {
            Self::Cards(cards) => cards,
            Self::Empty | Self::Error => &[],
        }
    }

    /// Inline message for the non-card states
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Cards(_) => None,
            Self::Empty => Some(EMPTY_MESSAGE),
            Self::Error => Some(ERROR_MESSAGE),
        }
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        match self {
            Self::Cards(cards) => cards.iter().map(ClinicCard::to_html).collect(),
            Self::Empty | Self::Error => {
                format!("<p>{}</p>", self.message().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextField;

    #[test]
    fn test_card_placeholders() {
        let card = ClinicCard::new(0, &ClinicRecord::new("Eastside", "10 Elm St"));
        assert_eq!(card.id, "clinic-0");
        assert_eq!(card.number, 1);
        assert_eq!(card.phone, "N/A");
        assert_eq!(card.services, "N/A");
        assert_eq!(card.payment, "N/A");
        assert_eq!(card.hours, "Unknown");
        assert!(card.website.is_none());
    }

    #[test]
    fn test_card_with_all_fields() {
        let clinic = ClinicRecord {
            phone: Some("512-555-0100".to_string()),
            services: Some(TextField::from(vec!["dental", "vision"])),
            insurance_payment: Some(TextField::from("Medicaid")),
            hours_label: Some("40 hours/week".to_string()),
            website: Some("eastside.example.org".to_string()),
            ..ClinicRecord::new("Eastside", "10 Elm St")
        };
        let card = ClinicCard::new(4, &clinic);

        assert_eq!(card.id, "clinic-4");
        assert_eq!(card.number, 5);
        assert_eq!(card.services, "dental, vision");
        assert_eq!(card.payment, "Medicaid");
        assert_eq!(card.hours, "40 hours/week");
        let site = card.website.as_ref().unwrap();
        assert_eq!(site.href, "https://eastside.example.org");
        assert_eq!(site.label, "eastside.example.org");

        let html = card.to_html();
        assert!(html.contains("<strong>5. Eastside</strong>"));
        assert!(html.contains("href=\"https://eastside.example.org\""));
    }

    #[test]
    fn test_results_view_states() {
        assert_eq!(ResultsView::from_results(&[]), ResultsView::Empty);
        assert_eq!(ResultsView::Empty.message(), Some(EMPTY_MESSAGE));
        assert_eq!(ResultsView::Error.to_html(), "<p>Error loading clinic data.</p>");

        let view = ResultsView::from_results(&[
            ClinicRecord::new("A", "1 Main"),
            ClinicRecord::new("B", "2 Main"),
        ]);
        let ids: Vec<&str> = view.cards().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["clinic-0", "clinic-1"]);
        assert!(view.message().is_none());
    }

    #[test]
    fn test_popup_is_escaped() {
        let popup = popup_html(&ClinicRecord::new("A & B <Clinic>", "1 Main"));
        assert_eq!(popup, "<b>A &amp; B &lt;Clinic&gt;</b><br>1 Main");
    }
}
