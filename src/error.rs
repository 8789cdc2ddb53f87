use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 表单交互错误
    Form(FormInteractionError),
    /// 存储层错误
    Storage(StorageError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::Form(e) => write!(f, "表单错误: {}", e),
            AppError::Storage(e) => write!(f, "存储错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Form(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 连接浏览器失败
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ConnectionFailed { port, source } => {
                write!(f, "无法连接到浏览器 (端口: {}): {}", port, source)
            }
            BrowserError::PageCreationFailed { source } => {
                write!(f, "创建页面失败: {}", source)
            }
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ConnectionFailed { source, .. }
            | BrowserError::PageCreationFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 表单交互错误
///
/// ElementNotFound 计入会话级连续错误计数；三连即中止本次运行
#[derive(Debug, Clone)]
pub enum FormInteractionError {
    /// 页面元素不存在（疑似布局变更或软封禁）
    ElementNotFound { selector: String },
    /// 表单布局与预期不符
    LayoutChanged { detail: String },
    /// 等待元素超时
    Timeout { waited_ms: u64 },
}

impl FormInteractionError {
    /// 是否属于可在表单层重试一次的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FormInteractionError::Timeout { .. } | FormInteractionError::ElementNotFound { .. }
        )
    }
}

impl fmt::Display for FormInteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormInteractionError::ElementNotFound { selector } => {
                write!(f, "未找到页面元素: {}", selector)
            }
            FormInteractionError::LayoutChanged { detail } => {
                write!(f, "表单布局发生变化: {}", detail)
            }
            FormInteractionError::Timeout { waited_ms } => {
                write!(f, "表单操作超时 (已等待 {}ms)", waited_ms)
            }
        }
    }
}

impl std::error::Error for FormInteractionError {}

/// 存储层错误
#[derive(Debug)]
pub enum StorageError {
    /// 职位ID已存在（幂等保护，不是故障）
    DuplicateJob { job_id: String },
    /// 打开数据库失败
    OpenFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// SQL 执行失败
    QueryFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 数据库 schema 版本高于程序支持的版本
    SchemaTooNew { found: i64, supported: i64 },
    /// 读回的行不符合写入时的格式，台账可能被外部改动
    CorruptRecord { job_id: String, detail: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DuplicateJob { job_id } => {
                write!(f, "职位 {} 已有投递记录", job_id)
            }
            StorageError::OpenFailed { path, source } => {
                write!(f, "打开数据库失败 ({}): {}", path, source)
            }
            StorageError::QueryFailed { source } => {
                write!(f, "SQL执行失败: {}", source)
            }
            StorageError::SchemaTooNew { found, supported } => {
                write!(f, "数据库版本 {} 高于程序支持的版本 {}", found, supported)
            }
            StorageError::CorruptRecord { job_id, detail } => {
                write!(f, "职位 {} 的记录已损坏: {}", job_id, detail)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::OpenFailed { source, .. } | StorageError::QueryFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 操作者档案不完整
    ProfileIncomplete { detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::ProfileIncomplete { detail } => {
                write!(f, "操作者档案不完整: {}", detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<BrowserError> for AppError {
    fn from(err: BrowserError) -> Self {
        AppError::Browser(err)
    }
}

impl From<FormInteractionError> for AppError {
    fn from(err: FormInteractionError) -> Self {
        AppError::Form(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed {
            source: Box::new(err),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建元素未找到错误
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        AppError::Form(FormInteractionError::ElementNotFound {
            selector: selector.into(),
        })
    }

    /// 提取内部的表单交互错误（用于判断是否计入连续错误）
    pub fn as_form_error(&self) -> Option<&FormInteractionError> {
        match self {
            AppError::Form(e) => Some(e),
            _ => None,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
