//! Text exposition format.

use crate::metrics::snapshot::{FamilySnapshot, SampleValue, Snapshot};
use std::fmt::Write;

/// Content type of [`encode_text`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a snapshot in the text exposition format.
pub fn encode_text(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for family in &snapshot.families {
        encode_family(family, &mut out);
    }
    out
}

fn encode_family(family: &FamilySnapshot, out: &mut String) {
    let name = &family.name;
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.help));
    let _ = writeln!(out, "# TYPE {} {}", name, family.kind);

    for series in &family.series {
        let labels = render_labels(&family.label_names, &series.label_values, None);
        match &series.value {
            SampleValue::Counter(v) => {
                let _ = writeln!(out, "{}{} {}", name, labels, v);
            }
            SampleValue::Gauge(v) => {
                let _ = writeln!(out, "{}{} {}", name, labels, format_float(*v));
            }
            SampleValue::Histogram(h) => {
                for (bound, count) in &h.buckets {
                    let le = format_float(*bound);
                    let bucket_labels =
                        render_labels(&family.label_names, &series.label_values, Some(le.as_str()));
                    let _ = writeln!(out, "{}_bucket{} {}", name, bucket_labels, count);
                }
                let inf_labels =
                    render_labels(&family.label_names, &series.label_values, Some("+Inf"));
                let _ = writeln!(out, "{}_bucket{} {}", name, inf_labels, h.count);
                let _ = writeln!(out, "{}_sum{} {}", name, labels, format_float(h.sum));
                let _ = writeln!(out, "{}_count{} {}", name, labels, h.count);
            }
        }
    }
}

/// `{k="v",...}`, or an empty string when there are no labels.
fn render_labels(names: &[String], values: &[String], le: Option<&str>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    if let Some(le) = le {
        pairs.push(format!("le=\"{}\"", le));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Registry;

    #[test]
    fn test_counter_lines() {
        let registry = Registry::new();
        let requests = registry
            .register_counter("requests_total", "Total requests", &["method", "status"])
            .unwrap();
        requests.series(&["GET", "200"]).unwrap().inc_by(3);

        let text = registry.encode();
        assert_eq!(
            text,
            "# HELP requests_total Total requests\n\
             # TYPE requests_total counter\n\
             requests_total{method=\"GET\",status=\"200\"} 3\n"
        );
    }

    #[test]
    fn test_unlabelled_gauge() {
        let registry = Registry::new();
        let gauge = registry
            .register_gauge("in_flight", "In flight", &[])
            .unwrap();
        gauge.unlabelled().unwrap().set(2.5);

        let text = registry.encode();
        assert!(text.contains("# TYPE in_flight gauge\n"));
        assert!(text.contains("\nin_flight 2.5\n"));
    }

    #[test]
    fn test_histogram_lines() {
        let registry = Registry::new();
        let latency = registry
            .register_histogram("latency_seconds", "Latency", &["route"], &[0.5, 1.0])
            .unwrap();
        let series = latency.series(&["/items/{id}"]).unwrap();
        series.observe(0.25);
        series.observe(0.5);
        series.observe(2.0);

        let text = registry.encode();
        let expected = "# HELP latency_seconds Latency\n\
                        # TYPE latency_seconds histogram\n\
                        latency_seconds_bucket{route=\"/items/{id}\",le=\"0.5\"} 2\n\
                        latency_seconds_bucket{route=\"/items/{id}\",le=\"1\"} 2\n\
                        latency_seconds_bucket{route=\"/items/{id}\",le=\"+Inf\"} 3\n\
                        latency_seconds_sum{route=\"/items/{id}\"} 2.75\n\
                        latency_seconds_count{route=\"/items/{id}\"} 3\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_label_value_escaping() {
        let registry = Registry::new();
        let family = registry.register_counter("odd_total", "Odd", &["v"]).unwrap();
        family.series(&["a\"b\\c\nd"]).unwrap().inc();

        let text = registry.encode();
        assert!(text.contains(r#"odd_total{v="a\"b\\c\nd"} 1"#));
    }

    #[test]
    fn test_help_escaping() {
        let registry = Registry::new();
        registry
            .register_counter("h_total", "line one\nline \\ two", &[])
            .unwrap();
        assert!(registry
            .encode()
            .starts_with("# HELP h_total line one\\nline \\\\ two\n"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(0.005), "0.005");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_empty_registry() {
        assert_eq!(encode_text(&Snapshot::default()), "");
    }
}
