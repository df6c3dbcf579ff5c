pub fn full_analysis_prompt(alert_text: &str) -> String {
    format!(
        r#"Analyze the following monitoring alert:

```
{alert_text}
```

Give a detailed analysis of this alert: extract all important information,
identify the likely cause of the problem and propose concrete remediation steps."#
    )
}

pub fn brief_analysis_prompt(alert_text: &str) -> String {
    // Brief mode is used when a file holds several alerts; keep the answer short.
    format!(
        r#"Analyze the following monitoring alert:

```
{alert_text}
```

Give a VERY BRIEF analysis (no more than 5-6 sentences) of this alert.
State only the main problem, the affected service and the probable cause."#
    )
}
