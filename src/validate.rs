//! Request validation: form fields in, `JobRequest` or a list of messages out.
//!
//! Validation never touches the filesystem. Every problem found is reported,
//! not just the first one.

use crate::config::AppConfig;
use crate::form::FormData;
use crate::model::{Analysis, ClusterFilter, JobRequest, ResultSelection, SortBy};
use crate::sequences::{source_from_form, SeqRole};

pub fn validate(
    form: &FormData,
    analysis: Analysis,
    cfg: &AppConfig,
) -> Result<JobRequest, Vec<String>> {
    let mut errors = Vec::new();

    let email = match form.get_nonempty("email") {
        None => {
            errors.push("No e-mail address specified".to_string());
            None
        }
        Some(e) if !looks_like_email(e) => {
            errors.push(format!("Invalid e-mail address '{e}'"));
            None
        }
        Some(e) => Some(e.to_string()),
    };

    let threshold = match form.get_nonempty("threshold") {
        None => {
            errors.push("No score threshold specified".to_string());
            None
        }
        Some(raw) => match parse_percent(raw) {
            Some(t) => Some(t),
            None => {
                errors.push(format!(
                    "Invalid score threshold '{raw}': must be a number between 0 and 100"
                ));
                None
            }
        },
    };

    let collections: Vec<String> = form.get_all("collection").into_iter().map(String::from).collect();
    if collections.is_empty() {
        errors.push("No JASPAR collection selected".to_string());
    }
    let tax_groups: Vec<String> = form.get_all("tax_group").into_iter().map(String::from).collect();

    let min_ic = optional_number(form, "min_ic", "minimum information content", &mut errors)
        .filter(|ic| {
            if *ic < 0.0 {
                errors.push(format!("Invalid minimum information content '{ic}'"));
                false
            } else {
                true
            }
        });

    let cluster_filter = match form.get_nonempty("tf_cluster_select") {
        None => {
            errors.push("No TFBS cluster selection specified".to_string());
            None
        }
        Some("all") => Some(ClusterFilter::All),
        Some("families") => {
            let families: Vec<String> =
                form.get_all("tf_family").into_iter().map(String::from).collect();
            if families.is_empty() {
                errors.push("No TFBS cluster families selected".to_string());
                None
            } else {
                Some(ClusterFilter::Families(families))
            }
        }
        Some(other) => {
            errors.push(format!("Unknown TFBS cluster selection '{other}'"));
            None
        }
    };

    let (anchor_tf, max_site_dist) = if analysis.is_anchored() {
        let anchor = form.get_nonempty("anchor_tf").map(String::from);
        if anchor.is_none() {
            errors.push("No anchor TF specified".to_string());
        }
        (anchor, site_distance(form, cfg.max_site_dist, &mut errors))
    } else {
        (None, None)
    };

    let target = source_from_form(form, SeqRole::Target, &cfg.bg_seq_sets)
        .map_err(|e| errors.push(e.to_string()))
        .ok();
    let background = source_from_form(form, SeqRole::Background, &cfg.bg_seq_sets)
        .map_err(|e| errors.push(e.to_string()))
        .ok();

    let selection = result_selection(form, &mut errors);

    let sort_by = match form.get_nonempty("result_sort_by") {
        None => None,
        Some(raw) => {
            let parsed = SortBy::parse(raw);
            if parsed.is_none() {
                errors.push(format!("Unknown result sort order '{raw}'"));
            }
            parsed
        }
    };

    match (email, threshold, cluster_filter, target, background) {
        (Some(email), Some(threshold), Some(cluster_filter), Some(target), Some(background))
            if errors.is_empty() =>
        {
            Ok(JobRequest {
                analysis,
                email,
                threshold,
                collections,
                tax_groups,
                min_ic,
                cluster_filter,
                anchor_tf,
                max_site_dist,
                target,
                background,
                selection,
                sort_by,
            })
        }
        _ => Err(errors),
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((user, host)) => {
            !user.is_empty() && !host.is_empty() && !host.contains('@') && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Accepts `85`, `85.5` and `85%`.
fn parse_percent(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim_end_matches('%').trim().parse().ok()?;
    (v.is_finite() && (0.0..=100.0).contains(&v)).then_some(v)
}

fn optional_number(
    form: &FormData,
    field: &str,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<f64> {
    let raw = form.get_nonempty(field)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            errors.push(format!("Invalid {label} '{raw}'"));
            None
        }
    }
}

fn site_distance(form: &FormData, max: u32, errors: &mut Vec<String>) -> Option<u32> {
    let raw = form.get_nonempty("dist")?;
    match raw.parse::<u32>() {
        Ok(d) if d > max => {
            errors.push(format!(
                "Inter-binding distance {d} exceeds the maximum allowed distance of {max} bp"
            ));
            None
        }
        Ok(d) => Some(d),
        Err(_) => {
            errors.push(format!("Invalid inter-binding distance '{raw}'"));
            None
        }
    }
}

fn result_selection(form: &FormData, errors: &mut Vec<String>) -> Option<ResultSelection> {
    match form.get_nonempty("result_type")? {
        "top_x_results" => match form.get_nonempty("num_display_results") {
            None => {
                errors.push("No number of results specified".to_string());
                None
            }
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => Some(ResultSelection::TopN(n)),
                _ => {
                    errors.push(format!("Invalid number of results '{raw}'"));
                    None
                }
            },
        },
        "significant_hits" => {
            let zscore_cutoff = optional_number(form, "zscore_cutoff", "Z-score cutoff", errors);
            let fisher_cutoff =
                optional_number(form, "fisher_cutoff", "Fisher p-value cutoff", errors);
            Some(ResultSelection::Significant {
                zscore_cutoff,
                fisher_cutoff,
            })
        }
        other => {
            errors.push(format!("Unknown result selection '{other}'"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeqSource;

    fn full_form() -> FormData {
        let mut form = FormData::new();
        form.insert("email", "user@example.org");
        form.insert("threshold", "85%");
        form.insert("collection", "CORE");
        form.insert("tax_group", "vertebrates");
        form.insert("tf_cluster_select", "all");
        form.insert("anchor_tf", "C0010");
        form.insert("seq_input_method", "paste");
        form.insert("seq_paste", ">s1\nACGT\n");
        form.insert("bg_seq_input_method", "paste");
        form.insert("bg_seq_paste", ">b1\nTTTT\n");
        form
    }

    fn without(field: &str) -> FormData {
        let base = full_form();
        let mut form = FormData::new();
        for name in [
            "email",
            "threshold",
            "collection",
            "tax_group",
            "tf_cluster_select",
            "anchor_tf",
            "seq_input_method",
            "seq_paste",
            "bg_seq_input_method",
            "bg_seq_paste",
        ] {
            if name != field {
                for v in base.get_all(name) {
                    form.insert(name, v);
                }
            }
        }
        form
    }

    #[test]
    fn test_complete_form_validates() {
        let req = validate(&full_form(), Analysis::Actca, &AppConfig::default()).unwrap();
        assert_eq!(req.email, "user@example.org");
        assert_eq!(req.threshold, 85.0);
        assert_eq!(req.collections, vec!["CORE"]);
        assert_eq!(req.tax_groups, vec!["vertebrates"]);
        assert_eq!(req.cluster_filter, ClusterFilter::All);
        assert_eq!(req.anchor_tf.as_deref(), Some("C0010"));
        assert_eq!(req.max_site_dist, None);
        assert_eq!(req.target, SeqSource::Pasted(">s1\nACGT\n".into()));
        assert_eq!(req.selection, None);
        assert_eq!(req.sort_by, None);
    }

    #[test]
    fn test_each_missing_required_field_reported() {
        let cases = [
            ("email", "No e-mail address specified"),
            ("threshold", "No score threshold specified"),
            ("collection", "No JASPAR collection selected"),
            ("tf_cluster_select", "No TFBS cluster selection specified"),
            ("anchor_tf", "No anchor TF specified"),
            ("seq_input_method", "No target sequence input method specified"),
            (
                "bg_seq_input_method",
                "No background sequence input method specified",
            ),
        ];
        for (field, message) in cases {
            let errors = validate(&without(field), Analysis::Actca, &AppConfig::default())
                .expect_err(field);
            assert_eq!(errors, vec![message.to_string()], "missing {field}");
        }
    }

    #[test]
    fn test_anchor_not_required_for_tca() {
        let req = validate(&without("anchor_tf"), Analysis::Tca, &AppConfig::default()).unwrap();
        assert_eq!(req.anchor_tf, None);
    }

    #[test]
    fn test_all_errors_accumulate() {
        let errors = validate(&FormData::new(), Analysis::Actca, &AppConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn test_site_distance_limit() {
        let cfg = AppConfig {
            max_site_dist: 100,
            ..AppConfig::default()
        };
        let mut form = full_form();
        form.insert("dist", "100");
        assert_eq!(
            validate(&form, Analysis::Actca, &cfg).unwrap().max_site_dist,
            Some(100)
        );

        let mut form = full_form();
        form.insert("dist", "101");
        let errors = validate(&form, Analysis::Actca, &cfg).unwrap_err();
        assert_eq!(
            errors,
            vec!["Inter-binding distance 101 exceeds the maximum allowed distance of 100 bp"]
        );

        let mut form = full_form();
        form.insert("dist", "far");
        let errors = validate(&form, Analysis::Actca, &cfg).unwrap_err();
        assert_eq!(errors, vec!["Invalid inter-binding distance 'far'"]);
    }

    #[test]
    fn test_invalid_values() {
        let mut form = without("threshold");
        form.insert("threshold", "120");
        form.insert("min_ic", "lots");
        form.insert("result_sort_by", "alphabet");
        let errors = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Invalid score threshold '120': must be a number between 0 and 100",
                "Invalid minimum information content 'lots'",
                "Unknown result sort order 'alphabet'",
            ]
        );

        let mut form = without("email");
        form.insert("email", "not-an-address");
        let errors = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap_err();
        assert_eq!(errors, vec!["Invalid e-mail address 'not-an-address'"]);
    }

    #[test]
    fn test_result_selection_modes() {
        let mut form = full_form();
        form.insert("result_type", "top_x_results");
        form.insert("num_display_results", "25");
        form.insert("result_sort_by", "fisher");
        let req = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap();
        assert_eq!(req.selection, Some(ResultSelection::TopN(25)));
        assert_eq!(req.sort_by, Some(SortBy::Fisher));

        let mut form = full_form();
        form.insert("result_type", "significant_hits");
        form.insert("zscore_cutoff", "8.5");
        let req = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap();
        assert_eq!(
            req.selection,
            Some(ResultSelection::Significant {
                zscore_cutoff: Some(8.5),
                fisher_cutoff: None
            })
        );

        let mut form = full_form();
        form.insert("result_type", "top_x_results");
        form.insert("num_display_results", "0");
        let errors = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap_err();
        assert_eq!(errors, vec!["Invalid number of results '0'"]);
    }

    #[test]
    fn test_family_filter_requires_families() {
        let mut form = without("tf_cluster_select");
        form.insert("tf_cluster_select", "families");
        let errors = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap_err();
        assert_eq!(errors, vec!["No TFBS cluster families selected"]);

        form.insert("tf_family", "bHLH");
        form.insert("tf_family", "Homeo");
        let req = validate(&form, Analysis::Tca, &AppConfig::default()).unwrap();
        assert_eq!(
            req.cluster_filter,
            ClusterFilter::Families(vec!["bHLH".into(), "Homeo".into()])
        );
    }
}
