use anyhow::Context;
use std::path::Path;

pub async fn run(input: &Path, output: &Path) -> anyhow::Result<()> {
    let (src, dst) = (input.to_path_buf(), output.to_path_buf());
    let tree = tokio::task::spawn_blocking(move || {
        rankscope_core::domain::category::convert_flat_taxonomy(&src, &dst)
    })
    .await
    .context("join build-tree task failed")?
    .with_context(|| format!("convert {} -> {}", input.display(), output.display()))?;

    tracing::info!(
        output = %output.display(),
        nodes = tree.len(),
        roots = tree.roots().len(),
        max_depth = tree.max_depth(),
        "category tree written"
    );
    Ok(())
}
