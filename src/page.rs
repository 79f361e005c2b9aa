//! Server-rendered HTML for the prediction form and probability chart.

use ccml_io::{Industry, Kpi, Observation, SurveyResult, Vocabulary};
use ccml_model::Prediction;

use crate::context::AppContext;

/// What to show under the form.
pub(crate) enum PageOutcome<'a> {
    /// A successful prediction.
    Predicted(&'a Prediction),
    /// The submission was refused; one message per problem.
    Rejected(&'a [String]),
}

const CHART_WIDTH: f64 = 520.0;
const CHART_HEIGHT: f64 = 340.0;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 96.0;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem;color:#222}\
.layout{display:flex;gap:2rem;flex-wrap:wrap}\
aside{min-width:14rem}\
label{display:block;margin-top:.8rem;font-weight:600}\
input[type=range]{width:22rem;vertical-align:middle}\
output{margin-left:.6rem;font-variant-numeric:tabular-nums}\
select{margin-top:.3rem;width:100%}\
button{margin-top:1.2rem;padding:.4rem 1.2rem}\
.accuracy{font-size:1.3rem}\
.errors{background:#fde8e8;border:1px solid #e0a0a0;padding:.6rem 1rem}";

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
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

/// Model accuracy as a whole-number percentage.
pub(crate) fn format_accuracy(accuracy: f64) -> String {
    format!("{:.0}%", accuracy * 100.0)
}

/// Render the full page with `form` as the current control values.
pub(crate) fn render(ctx: &AppContext, form: &Observation, outcome: &PageOutcome<'_>) -> String {
    let bundle = ctx.bundle();
    let mut html = String::with_capacity(8 * 1024);
    html.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    html.push_str("<title>Analytics Maturity Level Prediction</title>");
    html.push_str(&format!("<style>{STYLE}</style></head><body>"));
    html.push_str("<h1>Analytics Maturity Level Prediction</h1>");
    html.push_str("<form method=\"get\" action=\"/\"><div class=\"layout\"><section>");
    html.push_str("<h2>Select Variables</h2>");

    let ranges = bundle.kpi_ranges();
    for kpi in Kpi::ALL {
        let range = ranges.get(kpi);
        let value = ranges.clamp(kpi, form.kpis.get(kpi));
        html.push_str(&format!(
            "<label for=\"{field}\">{label}</label>\
             <input type=\"range\" id=\"{field}\" name=\"{field}\" min=\"{min}\" max=\"{max}\" step=\"any\" value=\"{value}\" \
             oninput=\"this.nextElementSibling.value=Number(this.value).toFixed(2)\">\
             <output>{value:.2}</output>",
            field = kpi.field(),
            label = escape_html(kpi.label()),
            min = range.min,
            max = range.max,
        ));
    }

    html.push_str("</section><aside>");
    html.push_str(&format!(
        "<p class=\"accuracy\">Model Accuracy: <strong>{}</strong></p>",
        format_accuracy(bundle.accuracy())
    ));
    html.push_str("<h2>Select Dropdowns</h2>");
    html.push_str(&select::<SurveyResult>("survey_result", form.survey_result));
    html.push_str(&select::<Industry>("industry", form.industry));
    html.push_str("<button type=\"submit\">Predict</button></aside></div></form>");

    match outcome {
        PageOutcome::Predicted(prediction) => {
            html.push_str(&format!(
                "<p><strong>Predicted Maturity Level:</strong> {}</p>",
                escape_html(prediction.label.as_str())
            ));
            html.push_str("<h2>Probability Distribution of Maturity Levels</h2>");
            html.push_str(&bar_chart(prediction));
        }
        PageOutcome::Rejected(messages) => {
            html.push_str("<div class=\"errors\"><p><strong>Input rejected</strong></p><ul>");
            for message in *messages {
                html.push_str(&format!("<li>{}</li>", escape_html(message)));
            }
            html.push_str("</ul></div>");
        }
    }

    html.push_str("</body></html>");
    html
}

fn select<V: Vocabulary + PartialEq>(name: &str, selected: V) -> String {
    let mut html = format!(
        "<label for=\"{name}\">{}</label><select id=\"{name}\" name=\"{name}\">",
        escape_html(V::COLUMN)
    );
    for &member in V::ALL {
        let label = escape_html(member.label());
        let mark = if member == selected { " selected" } else { "" };
        html.push_str(&format!("<option value=\"{label}\"{mark}>{label}</option>"));
    }
    html.push_str("</select>");
    html
}

/// SVG bar chart of class probabilities, annotated with two-decimal percentages.
pub(crate) fn bar_chart(prediction: &Prediction) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_height;
    let n = prediction.probabilities.len().max(1) as f64;
    let slot = plot_width / n;
    let bar_width = slot * 0.6;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{CHART_WIDTH}\" height=\"{CHART_HEIGHT}\" \
         viewBox=\"0 0 {CHART_WIDTH} {CHART_HEIGHT}\" role=\"img\" aria-label=\"Maturity Level Probabilities\">\
         <text x=\"{x}\" y=\"20\" text-anchor=\"middle\" font-weight=\"600\">Maturity Level Probabilities</text>",
        x = MARGIN_LEFT + plot_width / 2.0,
    );

    for tick in 0..=4 {
        let p = f64::from(tick) / 4.0;
        let y = baseline - p * plot_height;
        svg.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" x2=\"{x2}\" y1=\"{y:.1}\" y2=\"{y:.1}\" stroke=\"#ddd\"/>\
             <text x=\"{tx}\" y=\"{ty:.1}\" text-anchor=\"end\" font-size=\"10\">{p:.2}</text>",
            x2 = MARGIN_LEFT + plot_width,
            tx = MARGIN_LEFT - 6.0,
            ty = y + 3.0,
        ));
    }
    svg.push_str(&format!(
        "<text transform=\"rotate(-90 14 {cy:.1})\" x=\"14\" y=\"{cy:.1}\" text-anchor=\"middle\" font-size=\"12\">Probability</text>",
        cy = MARGIN_TOP + plot_height / 2.0,
    ));

    for (i, entry) in prediction.probabilities.iter().enumerate() {
        let height = entry.probability * plot_height;
        let x = MARGIN_LEFT + i as f64 * slot + (slot - bar_width) / 2.0;
        let y = baseline - height;
        let cx = x + bar_width / 2.0;
        let label = escape_html(entry.label.as_str());
        let fill = if entry.label == prediction.label { "#2b6cb0" } else { "#90b4dc" };
        svg.push_str(&format!(
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{bar_width:.1}\" height=\"{height:.1}\" fill=\"{fill}\"/>\
             <text x=\"{cx:.1}\" y=\"{ay:.1}\" text-anchor=\"middle\" font-size=\"11\">{pct:.2}%</text>\
             <text transform=\"rotate(-45 {cx:.1} {ly:.1})\" x=\"{cx:.1}\" y=\"{ly:.1}\" text-anchor=\"end\" font-size=\"12\">{label}</text>",
            ay = y - 4.0,
            pct = entry.probability * 100.0,
            ly = baseline + 16.0,
        ));
    }

    svg.push_str(&format!(
        "<line x1=\"{MARGIN_LEFT}\" x2=\"{x2}\" y1=\"{baseline}\" y2=\"{baseline}\" stroke=\"#333\"/>\
         <text x=\"{x}\" y=\"{y}\" text-anchor=\"middle\" font-size=\"12\">Maturity Level</text></svg>",
        x2 = MARGIN_LEFT + plot_width,
        x = MARGIN_LEFT + plot_width / 2.0,
        y = CHART_HEIGHT - 8.0,
    ));
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccml_io::MaturityLevel;
    use ccml_model::ClassProbability;

    fn prediction(entries: &[(&str, f64)]) -> Prediction {
        let probabilities: Vec<ClassProbability> = entries
            .iter()
            .map(|&(label, probability)| ClassProbability {
                label: MaturityLevel::new(label),
                probability,
            })
            .collect();
        let label = probabilities
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
            .map(|p| p.label.clone())
            .unwrap();
        Prediction {
            label,
            probabilities,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"R&D\" 'lab'</b>"),
            "&lt;b&gt;&quot;R&amp;D&quot; &#39;lab&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn accuracy_is_whole_percent() {
        assert_eq!(format_accuracy(0.8333), "83%");
        assert_eq!(format_accuracy(1.0), "100%");
        assert_eq!(format_accuracy(0.0), "0%");
    }

    #[test]
    fn chart_has_one_bar_and_annotation_per_class() {
        let svg = bar_chart(&prediction(&[("High", 0.125), ("Low", 0.5), ("Medium", 0.375)]));
        assert_eq!(svg.matches("<rect").count(), 3);
        assert!(svg.contains(">12.50%<"));
        assert!(svg.contains(">50.00%<"));
        assert!(svg.contains(">37.50%<"));
        assert!(svg.contains("rotate(-45"));
    }

    #[test]
    fn chart_escapes_class_labels() {
        let svg = bar_chart(&prediction(&[("<Initial>", 0.4), ("Mature", 0.6)]));
        assert!(svg.contains("&lt;Initial&gt;"));
        assert!(!svg.contains("<Initial>"));
    }

    #[test]
    fn select_marks_current_choice() {
        let html = select::<Industry>("industry", Industry::TechSupport);
        assert!(html.contains("<option value=\"Tech Support\" selected>Tech Support</option>"));
        assert_eq!(html.matches("<option").count(), 5);
    }
}
