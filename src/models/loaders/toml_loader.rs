use crate::models::profile::KnowledgeProfile;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载操作者档案
///
/// 简历文本由外部抽取工具预先写入档案文件，这里只做读取与解析
pub async fn load_profile(profile_path: &Path) -> Result<KnowledgeProfile> {
    let content = fs::read_to_string(profile_path)
        .await
        .with_context(|| format!("无法读取档案文件: {}", profile_path.display()))?;

    let profile: KnowledgeProfile = toml::from_str(&content)
        .with_context(|| format!("无法解析档案文件: {}", profile_path.display()))?;

    if profile.resume_text.trim().is_empty() {
        anyhow::bail!("档案缺少简历文本: {}", profile_path.display());
    }

    tracing::info!(
        "✓ 档案加载成功: {} (附属材料 {} 份)",
        profile_path.display(),
        profile.attachments.len()
    );

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_profile_from_toml() {
        let dir = std::env::temp_dir().join("auto_job_apply_profile_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.toml");
        std::fs::write(
            &path,
            r#"
name = "Ana Silva"
email = "ana@example.com"
resume_text = "Senior backend engineer, 5 years of experience."
bio = "I enjoy distributed systems."

[[attachments]]
label = "portfolio"
path = "docs/portfolio.pdf"
"#,
        )
        .unwrap();

        let profile = load_profile(&path).await.expect("档案应能加载");
        assert_eq!(profile.name, "Ana Silva");
        assert_eq!(profile.attachments.len(), 1);
        assert!(profile.is_complete());
    }

    #[tokio::test]
    async fn test_load_profile_rejects_empty_resume() {
        let dir = std::env::temp_dir().join("auto_job_apply_profile_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.toml");
        std::fs::write(&path, "name = \"A\"\nresume_text = \"  \"\n").unwrap();

        assert!(load_profile(&path).await.is_err());
    }
}
