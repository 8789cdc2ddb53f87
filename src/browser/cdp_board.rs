//! CDP 招聘板实现
//!
//! 所有 DOM 读写都通过 JS 求值完成，选择器集中在常量区，
//! 站点改版只需要改这里。

use crate::browser::job_board::{FormHandle, FormStep, JobBoard};
use crate::error::{AppError, AppResult, FormInteractionError};
use crate::infrastructure::JsExecutor;
use crate::models::{JobListing, Question, ResolvedAnswer, SearchCriteria};
use async_trait::async_trait;
use chromiumoxide::Page;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const EASY_APPLY_BUTTON: &str = "button.jobs-apply-button";
const FORM_SECTION: &str = ".jobs-easy-apply-content";
const NEXT_BUTTON: &str = r#"button[aria-label="Continue to next step"]"#;
const REVIEW_BUTTON: &str = r#"button[aria-label="Review your application"]"#;
const SUBMIT_BUTTON: &str = r#"button[aria-label="Submit application"]"#;
const CLOSE_BUTTON: &str = r#"button[aria-label="Dismiss"]"#;

/// DOM 更新后的短暂等待
const SETTLE_DELAY: Duration = Duration::from_millis(800);

/// CDP 招聘板
pub struct CdpJobBoard {
    executor: JsExecutor,
    search_url: String,
}

impl CdpJobBoard {
    pub fn new(page: Page, search_url: String) -> Self {
        Self {
            executor: JsExecutor::new(page),
            search_url,
        }
    }

    async fn goto(&self, url: &str) -> AppResult<()> {
        self.executor.page().goto(url).await?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }
}

#[async_trait]
impl JobBoard for CdpJobBoard {
    async fn find_applicable_jobs(
        &self,
        criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>> {
        let mut url = format!(
            "{}?keywords={}",
            self.search_url,
            urlencode(&criteria.query_string())
        );
        if !criteria.location.is_empty() {
            url.push_str(&format!("&location={}", urlencode(&criteria.location)));
        }
        if criteria.remote_only {
            // f_WT=2: 远程职位过滤
            url.push_str("&f_WT=2");
        }
        self.goto(&url).await?;

        // 职位卡片逐个读出，缺 data-job-id 的卡片丢弃
        let js = r#"
            (() => {
                const cards = document.querySelectorAll('[data-job-id]');
                const jobs = [];
                for (const card of cards) {
                    const jobId = card.getAttribute('data-job-id');
                    if (!jobId) continue;
                    const title = card.querySelector('a strong, .job-card-list__title')
                        ?.textContent?.trim() ?? '';
                    const employer = card.querySelector('.job-card-container__primary-description, .artdeco-entity-lockup__subtitle')
                        ?.textContent?.trim() ?? '';
                    const location = card.querySelector('.job-card-container__metadata-item')
                        ?.textContent?.trim() ?? null;
                    if (!title) continue;
                    jobs.push({
                        jobId,
                        employer,
                        title,
                        location,
                        url: `https://www.linkedin.com/jobs/view/${jobId}/`,
                    });
                }
                return jobs;
            })()
        "#;
        let jobs: Vec<JobListing> = self.executor.eval_as(js).await?;
        info!("📋 检索到 {} 个职位", jobs.len());
        Ok(jobs)
    }

    async fn open(&self, job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>> {
        debug!("打开职位页面: {}", job.url);
        self.goto(&job.url).await?;

        // 没有快速申请按钮不算错误，该职位走普通申请渠道
        let clicked: bool = self
            .executor
            .eval_as(format!(
                r#"(() => {{
                    const btn = document.querySelector('{}');
                    if (!btn) return false;
                    btn.click();
                    return true;
                }})()"#,
                EASY_APPLY_BUTTON
            ))
            .await?;
        if !clicked {
            return Ok(None);
        }
        sleep(SETTLE_DELAY).await;

        Ok(Some(Box::new(CdpFormHandle {
            executor: JsExecutor::new(self.executor.page().clone()),
        })))
    }
}

/// 打开中的快速申请表单
pub struct CdpFormHandle {
    executor: JsExecutor,
}

impl CdpFormHandle {
    /// 点击选择器命中的按钮，返回是否点到
    async fn click(&self, selector: &str) -> AppResult<bool> {
        let clicked: bool = self
            .executor
            .eval_as(format!(
                r#"(() => {{
                    const btn = document.querySelector('{}');
                    if (!btn || btn.disabled) return false;
                    btn.click();
                    return true;
                }})()"#,
                selector
            ))
            .await?;
        if clicked {
            sleep(SETTLE_DELAY).await;
        }
        Ok(clicked)
    }

    /// 按题面文字把答案填进对应控件
    async fn fill_one(&self, question: &Question, answer: &ResolvedAnswer) -> AppResult<()> {
        let prompt_json = serde_json::to_string(&question.prompt)?;
        let value_json = serde_json::to_string(&answer.value.as_form_value())?;
        let js = format!(
            r#"(() => {{
                const section = document.querySelector('{section}');
                if (!section) return 'no-section';
                const labels = [...section.querySelectorAll('label, legend')];
                const label = labels.find(l => l.textContent.trim() === {prompt});
                if (!label) return 'no-label';
                const value = {value};
                const scope = label.closest('div, fieldset') ?? section;

                const select = scope.querySelector('select');
                if (select) {{
                    const opt = [...select.options].find(o => o.textContent.trim() === value);
                    if (!opt) return 'no-option';
                    select.value = opt.value;
                    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return 'ok';
                }}
                const radios = [...scope.querySelectorAll('input[type="radio"]')];
                if (radios.length > 0) {{
                    for (const radio of radios) {{
                        const text = radio.closest('label')?.textContent?.trim()
                            ?? scope.querySelector(`label[for="${{radio.id}}"]`)?.textContent?.trim();
                        if (text === value) {{
                            radio.click();
                            return 'ok';
                        }}
                    }}
                    return 'no-option';
                }}
                const input = scope.querySelector('input, textarea');
                if (!input) return 'no-input';
                const setter = Object.getOwnPropertyDescriptor(
                    Object.getPrototypeOf(input), 'value')?.set;
                if (setter) setter.call(input, value); else input.value = value;
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            section = FORM_SECTION,
            prompt = prompt_json,
            value = value_json,
        );
        let outcome: String = self.executor.eval_as(js).await?;
        match outcome.as_str() {
            "ok" => Ok(()),
            "no-section" => Err(AppError::element_not_found(FORM_SECTION)),
            other => Err(AppError::Form(FormInteractionError::LayoutChanged {
                detail: format!("填写 '{}' 失败: {}", question.prompt, other),
            })),
        }
    }
}

#[async_trait]
impl FormHandle for CdpFormHandle {
    async fn extract_questions(&self) -> AppResult<Vec<Question>> {
        // 题型在提取时就定死：控件形状优先于题面文字，
        // 只有 number 输入框才判 numeric，单选控件一律 single_choice
        let js = format!(
            r#"(() => {{
                const section = document.querySelector('{section}');
                if (!section) return null;
                const questions = [];
                const seen = new Set();

                for (const select of section.querySelectorAll('select')) {{
                    const label = section.querySelector(`label[for="${{select.id}}"]`)
                        ?? select.closest('div')?.querySelector('label');
                    const prompt = label?.textContent?.trim();
                    if (!prompt || seen.has(prompt)) continue;
                    seen.add(prompt);
                    const choices = [...select.options]
                        .map(o => o.textContent.trim())
                        .filter(t => t && !/^select/i.test(t) && t !== '请选择');
                    questions.push({{ prompt, kind: 'single_choice', choices }});
                }}

                for (const group of section.querySelectorAll('fieldset')) {{
                    const radios = [...group.querySelectorAll('input[type="radio"]')];
                    if (radios.length === 0) continue;
                    const prompt = group.querySelector('legend')?.textContent?.trim();
                    if (!prompt || seen.has(prompt)) continue;
                    seen.add(prompt);
                    const choices = radios
                        .map(r => r.closest('label')?.textContent?.trim()
                            ?? group.querySelector(`label[for="${{r.id}}"]`)?.textContent?.trim())
                        .filter(t => t);
                    questions.push({{ prompt, kind: 'single_choice', choices }});
                }}

                for (const input of section.querySelectorAll(
                    'input[type="text"], input[type="email"], input[type="tel"], input[type="number"], textarea')) {{
                    if (input.value && input.value.trim() !== '') continue;
                    const label = section.querySelector(`label[for="${{input.id}}"]`)
                        ?? input.closest('div')?.querySelector('label');
                    const prompt = label?.textContent?.trim();
                    if (!prompt || seen.has(prompt)) continue;
                    seen.add(prompt);
                    if (input.type === 'number') {{
                        questions.push({{ prompt, kind: 'numeric', choices: [] }});
                    }} else {{
                        const maxChars = input.maxLength > 0 ? input.maxLength : 300;
                        questions.push({{ prompt, kind: 'free_text', max_chars: maxChars, choices: [] }});
                    }}
                }}

                return questions;
            }})()"#,
            section = FORM_SECTION,
        );
        let extracted: Option<Vec<Question>> = self.executor.eval_as(js).await?;
        let questions = extracted.ok_or_else(|| AppError::element_not_found(FORM_SECTION))?;
        debug!("表单提取到 {} 个待答问题", questions.len());
        Ok(questions)
    }

    async fn fill(&self, answers: &[(Question, ResolvedAnswer)]) -> AppResult<()> {
        for (question, answer) in answers {
            self.fill_one(question, answer).await?;
        }
        Ok(())
    }

    async fn advance(&self) -> AppResult<FormStep> {
        // 提交 → 审阅 → 下一步 的优先级推进一步；
        // 审阅页也当普通页处理，翻过去后提取不出问题，下次推进命中提交
        if self.click(SUBMIT_BUTTON).await? {
            let _ = self.click(CLOSE_BUTTON).await;
            info!("📤 申请已提交");
            return Ok(FormStep::Submitted);
        }
        if self.click(REVIEW_BUTTON).await? || self.click(NEXT_BUTTON).await? {
            return Ok(FormStep::NextPage);
        }
        Err(AppError::element_not_found(SUBMIT_BUTTON))
    }

    async fn abandon(&self) -> AppResult<()> {
        if !self.click(CLOSE_BUTTON).await? {
            warn!("关闭表单弹窗失败，可能已自行关闭");
        }
        // 部分站点会弹出确认丢弃的对话框
        let _ = self
            .click(r#"button[data-control-name="discard_application_confirm_btn"]"#)
            .await;
        Ok(())
    }
}

/// 最小 URL 组件转义，只处理检索词里常见的字符
fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '&' => out.push_str("%26"),
            '#' => out.push_str("%23"),
            '+' => out.push_str("%2B"),
            '?' => out.push_str("%3F"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}
