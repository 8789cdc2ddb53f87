/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口（外部隐身浏览器以 --remote-debugging-port 启动）
    pub browser_debug_port: u16,
    /// 职位搜索页 URL
    pub search_url: String,
    /// 搜索关键词（逗号分隔的环境变量）
    pub search_keywords: Vec<String>,
    /// 搜索地点
    pub search_location: String,
    /// 只看远程职位
    pub remote_only: bool,
    /// 数据库文件路径
    pub db_path: String,
    /// 操作者档案 TOML 文件路径
    pub profile_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 浏览器是否无头运行（透传给外部驱动，并写入配置表供界面读取）
    pub headless: bool,
    // --- 频控配置 ---
    /// 日投递上限（全局顶格值，强制收敛到 40..=50）
    pub daily_cap_ceiling: u32,
    /// 是否启用养号爬坡（前三天 10/20/30）
    pub warmup_enabled: bool,
    /// 微延迟区间（秒）——普通动作之间
    pub micro_delay_secs: (f64, f64),
    /// 投递间延迟区间（秒）——完整投递之后
    pub application_delay_secs: (f64, f64),
    /// 每处理多少份投递后强制疲劳暂停
    pub pause_after_applications: u32,
    /// 疲劳暂停时长区间（分钟）
    pub pause_minutes: (u64, u64),
    /// 连续错误多少次后中止会话
    pub max_consecutive_errors: u32,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 自由文本答案的最大字符数
    pub max_answer_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            search_url: "https://www.linkedin.com/jobs/search/".to_string(),
            search_keywords: vec!["Software Engineer".to_string()],
            search_location: String::new(),
            remote_only: false,
            db_path: "data/candidacies.db".to_string(),
            profile_path: "data/profile.toml".to_string(),
            verbose_logging: false,
            headless: false,
            daily_cap_ceiling: 40,
            warmup_enabled: true,
            micro_delay_secs: (1.5, 4.0),
            application_delay_secs: (120.0, 600.0),
            pause_after_applications: 10,
            pause_minutes: (15, 30),
            max_consecutive_errors: 3,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            max_answer_chars: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            search_url: std::env::var("SEARCH_URL").unwrap_or(default.search_url),
            search_keywords: std::env::var("SEARCH_KEYWORDS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(default.search_keywords),
            search_location: std::env::var("SEARCH_LOCATION").unwrap_or(default.search_location),
            remote_only: std::env::var("REMOTE_ONLY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.remote_only),
            db_path: std::env::var("DB_PATH").unwrap_or(default.db_path),
            profile_path: std::env::var("PROFILE_PATH").unwrap_or(default.profile_path),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            daily_cap_ceiling: std::env::var("DAILY_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(default.daily_cap_ceiling),
            warmup_enabled: std::env::var("WARMUP_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.warmup_enabled),
            micro_delay_secs: default.micro_delay_secs,
            application_delay_secs: default.application_delay_secs,
            pause_after_applications: std::env::var("PAUSE_AFTER_APPLICATIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.pause_after_applications),
            pause_minutes: default.pause_minutes,
            max_consecutive_errors: std::env::var("MAX_CONSECUTIVE_ERRORS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_consecutive_errors),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            max_answer_chars: std::env::var("MAX_ANSWER_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_answer_chars),
        }
    }
}
