use indicatif::ProgressStyle;

pub(crate) fn get_style_task() -> Result<ProgressStyle, indicatif::style::TemplateError> {
    Ok(ProgressStyle::default_spinner()
        .template("{spinner:.blue} {span_name} {msg} {elapsed:.dim}")?
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "))
}

/// Title-cases a word list such as `select-basic`, giving `Select Basic`.
pub(crate) fn title_case(text: &str) -> String {
    text.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Installs the global subscriber: `fmt` output routed through the progress
/// bars, filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .try_init()?;

    Ok(())
}
