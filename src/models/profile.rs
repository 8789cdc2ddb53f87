use serde::{Deserialize, Serialize};

/// 附属材料引用（作品集、证书等）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    /// 材料标签（如 "portfolio"）
    pub label: String,
    /// 文件路径或标识符
    pub path: String,
}

/// 操作者知识库
///
/// 保存操作者的结构化档案（简历文本、自述、附属材料），
/// 是回答表单问题时 LLM 的唯一事实来源。
/// 运行期间只读共享，只有操作者显式更新时才变化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// 简历抽取出的纯文本（抽取过程由外部工具完成）
    pub resume_text: String,
    #[serde(default)]
    pub bio: String,
    /// 附属材料，顺序有意义
    #[serde(default)]
    pub attachments: Vec<DocumentRef>,
}

impl KnowledgeProfile {
    /// 档案是否具备最低可用信息
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.resume_text.is_empty()
    }

    /// 渲染给 LLM 的上下文文本
    pub fn context_for_llm(&self) -> String {
        let mut parts = Vec::new();

        if !self.name.is_empty() {
            parts.push(format!("Name: {}", self.name));
        }
        if !self.email.is_empty() {
            parts.push(format!("Email: {}", self.email));
        }
        if !self.phone.is_empty() {
            parts.push(format!("Phone: {}", self.phone));
        }

        if !self.resume_text.is_empty() {
            parts.push(format!("\n--- RESUME ---\n{}", self.resume_text));
        }
        if !self.bio.is_empty() {
            parts.push(format!("\n--- BIO ---\n{}", self.bio));
        }
        if !self.attachments.is_empty() {
            let list: Vec<String> = self
                .attachments
                .iter()
                .map(|d| format!("- {}: {}", d.label, d.path))
                .collect();
            parts.push(format!("\n--- ATTACHMENTS ---\n{}", list.join("\n")));
        }

        parts.join("\n")
    }
}
