//! Chat text for readings, reports and command replies (Telegram HTML)

use crate::scheduler::ScheduledRelease;
use crate::scoring::{AggregateResult, Classification, ComponentScore, Normalization};
use crate::storage::PredictionRecord;
use crate::tracker::PerformanceReport;
use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;

const MAX_KEY_FACTORS: usize = 3;

/// One outcome with its probability
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub probability: u8,
    pub description: &'static str,
    pub key_factors: Vec<String>,
}

pub struct NarrativeFormatter;

impl NarrativeFormatter {
    /// Full reading message
    pub fn reading(result: &AggregateResult, event: &str, at: DateTime<Utc>) -> String {
        let mut msg = format!(
            "🧭 <b>USD Macro Reading</b> | {} (NY)\nEvent: <b>{}</b>\n\n",
            at.with_timezone(&New_York).format("%Y-%m-%d %H:%M"),
            escape_html(event)
        );

        if result.is_empty() {
            msg.push_str("No released indicator data available.\n\n");
        } else {
            for component in &result.components {
                msg.push_str(&Self::component_line(component));
                msg.push('\n');
            }
            msg.push('\n');
        }

        msg.push_str(&format!(
            "🧮 <b>USD Score</b>: <code>{:+.2}</code> → <b>{}</b> (confidence: {})\n\n",
            result.score, result.classification, result.confidence
        ));

        let (base, alternative) = Self::scenarios(result);
        msg.push_str(&format!(
            "📌 <b>Base case</b> ({}%): {}\n",
            base.probability, base.description
        ));
        for factor in &base.key_factors {
            msg.push_str(&format!("   • {}\n", escape_html(factor)));
        }
        msg.push_str(&format!(
            "📌 <b>Alternative</b> ({}%): {}\n\n",
            alternative.probability, alternative.description
        ));

        msg.push_str(&format!(
            "🎯 <b>Direction</b>: {}\n👀 <b>Pairs</b>: {}",
            Self::directional_suggestion(result.classification),
            Self::suggested_pairs(result.classification).join(", ")
        ));
        msg
    }

    pub fn component_line(c: &ComponentScore) -> String {
        let baseline = if c.discounted {
            format!("{} (prev, weight halved)", fmt_value(c.baseline))
        } else {
            fmt_value(c.baseline)
        };
        let surprise = match c.normalization {
            Normalization::Percent => format!("{:+.1}%", c.surprise),
            Normalization::Point => format!("{:+.2}", c.surprise),
        };
        format!(
            "• <b>{}</b>: {} vs {} → surprise {} | sub {:+} (w={:.2})",
            escape_html(&c.indicator_name),
            fmt_value(c.actual),
            baseline,
            surprise,
            c.sub_score,
            c.weight
        )
    }

    /// Base and alternative scenario for a reading
    pub fn scenarios(result: &AggregateResult) -> (Scenario, Scenario) {
        if result.is_empty() {
            return (
                Scenario {
                    probability: 50,
                    description: "Insufficient data",
                    key_factors: Vec::new(),
                },
                Scenario {
                    probability: 50,
                    description: "Waiting for data",
                    key_factors: Vec::new(),
                },
            );
        }

        let magnitude = result.score.abs();
        let base_probability = if magnitude >= 1.5 {
            75
        } else if magnitude <= 0.5 {
            55
        } else {
            65
        };

        let (base, alternative) = match result.classification.direction() {
            1 => (
                "Data confirms USD strength with the Fed holding a hawkish stance",
                "Strength may prove temporary; the market could price a dovish Fed turn",
            ),
            -1 => (
                "Data points to USD weakness and pressure for a dovish Fed",
                "Weakness may be transitory with the Fed staying hawkish",
            ),
            _ => (
                "Mixed data keeps USD range-bound until the next catalyst",
                "Volatility could break the range in either direction",
            ),
        };

        (
            Scenario {
                probability: base_probability,
                description: base,
                key_factors: Self::key_factors(&result.components),
            },
            Scenario {
                probability: 100 - base_probability,
                description: alternative,
                key_factors: Vec::new(),
            },
        )
    }

    /// Largest contributors first, neutral components skipped
    pub fn key_factors(components: &[ComponentScore]) -> Vec<String> {
        let mut movers: Vec<&ComponentScore> = components.iter().filter(|c| c.sub_score != 0).collect();
        movers.sort_by(|a, b| {
            b.contribution
                .abs()
                .total_cmp(&a.contribution.abs())
                .then_with(|| a.indicator_name.cmp(&b.indicator_name))
        });

        movers
            .into_iter()
            .take(MAX_KEY_FACTORS)
            .map(|c| {
                if c.sub_score > 0 {
                    format!("{} surprised USD-positive", c.indicator_name)
                } else {
                    format!("{} surprised USD-negative", c.indicator_name)
                }
            })
            .collect()
    }

    pub fn directional_suggestion(classification: Classification) -> &'static str {
        match classification {
            Classification::StrongUsd => "SELL EUR/USD, GBP/USD; BUY USD/JPY",
            Classification::MildlyStrong => "Sell bias on EUR/USD, wait for confirmation",
            Classification::Neutral => "Wait for directional confirmation, trade the ranges",
            Classification::MildlyWeak => "Buy bias on EUR/USD, wait for confirmation",
            Classification::WeakUsd => "BUY EUR/USD, GBP/USD; SELL USD/JPY",
        }
    }

    pub fn suggested_pairs(classification: Classification) -> &'static [&'static str] {
        match classification {
            Classification::StrongUsd => &["EUR/USD", "GBP/USD", "AUD/USD", "USD/JPY", "USD/CHF"],
            Classification::MildlyStrong | Classification::MildlyWeak => &["EUR/USD", "GBP/USD", "USD/JPY"],
            Classification::Neutral => &["EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD"],
            Classification::WeakUsd => &["EUR/USD", "GBP/USD", "AUD/USD", "NZD/USD", "USD/JPY"],
        }
    }

    pub fn hit_rate_report(report: &PerformanceReport) -> String {
        let mut msg = format!("📈 <b>Hit Rate</b> (last {} days)\n\n", report.period_days);

        if !report.has_measurements() {
            msg.push_str(&format!(
                "Still collecting data ({} predictions logged, none measured yet).",
                report.total_predictions
            ));
            return msg;
        }

        msg.push_str("🎯 <b>Overall</b>\n");
        for h in &report.horizons {
            msg.push_str(&format!(
                "• {}min: {} ({} measured)\n",
                h.horizon_mins,
                fmt_rate(h.hit_rate()),
                h.measured
            ));
        }
        msg.push_str(&format!("• Total predictions: {}\n", report.total_predictions));

        if !report.by_event.is_empty() {
            msg.push_str("\n📊 <b>By event</b>\n");
            for e in &report.by_event {
                msg.push_str(&format!(
                    "• {}: {} ({} predictions)\n",
                    escape_html(&e.event_type),
                    fmt_rate(e.hit_rate()),
                    e.predictions
                ));
            }
        }
        msg.trim_end().to_string()
    }

    pub fn status(
        sources: &[String],
        upcoming: &[ScheduledRelease],
        last: Option<&PredictionRecord>,
        now: DateTime<Utc>,
    ) -> String {
        let mut msg = format!(
            "📊 <b>Bot Status</b>\n\n🟢 Running\n📅 Timezone: America/New_York ({})\n",
            now.with_timezone(&New_York).format("%Y-%m-%d %H:%M")
        );

        if sources.is_empty() {
            msg.push_str("🔌 Sources: none configured\n");
        } else {
            msg.push_str(&format!("🔌 Sources: {}\n", sources.join(", ")));
        }

        match last {
            Some(record) => msg.push_str(&format!(
                "🔄 Last reading: {} {} {:+.2} ({})\n",
                record.timestamp.with_timezone(&New_York).format("%Y-%m-%d %H:%M"),
                escape_html(&record.event_type),
                record.usd_score,
                escape_html(&record.classification)
            )),
            None => msg.push_str("🔄 Last reading: none yet\n"),
        }

        let fixed: Vec<&ScheduledRelease> = upcoming.iter().filter(|r| !r.event.same_day_only()).collect();
        if fixed.is_empty() {
            msg.push_str("\n📋 No scheduled releases in the next 7 days\n");
        } else {
            msg.push_str("\n📋 <b>Upcoming releases</b>\n");
            for release in fixed.into_iter().take(10) {
                msg.push_str(&format!(
                    "• {} - {}\n",
                    release.at.format("%a %Y-%m-%d %H:%M"),
                    release.event.title()
                ));
            }
        }
        if upcoming.iter().any(|r| r.event.same_day_only()) {
            msg.push_str("🏦 FOMC decision checked every business day at 14:00\n");
        }
        msg.trim_end().to_string()
    }

    pub fn help() -> String {
        "🧭 <b>USD Macro Bot</b>\n\n\
         I track US economic releases and score their surprise into a USD bias.\n\n\
         <b>Commands</b>\n\
         • /status - bot status and upcoming releases\n\
         • /score - manual USD reading from the latest data\n\
         • /hitrate - historical accuracy against DXY\n\
         • /help - this message\n\n\
         <b>Indicators</b>\n\
         • Employment: NFP, Unemployment, AHE, ADP, Claims\n\
         • Inflation: CPI, Core CPI, PCE, Core PCE\n\
         • Activity: ISM Manufacturing/Services, Retail Sales\n\
         • Policy: FOMC rate decision\n\n\
         Automatic readings are sent at release times (New York)."
            .to_string()
    }

    pub fn unknown_command(command: &str) -> String {
        format!(
            "Unknown command <code>{}</code>. Send /help for the list of commands.",
            escape_html(command)
        )
    }

    pub fn error(context: &str) -> String {
        format!("❌ Could not {}. Please try again later.", escape_html(context))
    }
}

fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn fmt_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Strip tags and entities for terminal output
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}
