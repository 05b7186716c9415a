//! Post-run guidance rendering
//!
//! After the steps finish, the operator gets a checklist of manual follow-up
//! actions rendered from a minijinja template. Sections for the honeypot and
//! the ban daemon only appear when those steps actually ran.

use crate::ProvisionError;
use crate::config::ProvisionRequest;
use crate::modules::StepOutcome;
use crate::runner::RunReport;
use crate::state::HostPaths;
use crate::state::accounts;
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

const GUIDANCE: &str = "\
Provisioning finished. Remaining manual steps:

  1. Copy the private key {{ key_path }} to your workstation, then delete it from this server.
  2. Log in from a new session before closing this one:
       ssh -p {{ ssh_port }} -i <local copy of id_rsa> {{ user }}@<server>
{%- if honeypot %}
  3. Check the honeypot answers on port {{ honeypot_port }}:
       docker ps --filter name=cowrie
       docker logs cowrie
{%- endif %}
{%- if fail2ban %}
  {{ 4 if honeypot else 3 }}. Check the SSH jail is active:
       fail2ban-client status sshd
{%- endif %}
{%- if failures %}

Steps that failed and need attention:
{%- for f in failures %}
  - {{ f.step }}: {{ f.error }}
{%- endfor %}
{%- endif %}
";

/// Values available to the guidance template
#[derive(Debug, Clone, Serialize)]
pub struct Guidance {
    pub user: String,
    pub key_path: String,
    pub ssh_port: u16,
    pub honeypot_port: u16,
    pub honeypot: bool,
    pub fail2ban: bool,
    pub failures: Vec<FailedStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedStep {
    pub step: String,
    pub error: String,
}

impl Guidance {
    /// Collect guidance values from the request and the finished run
    pub async fn from_run(
        paths: &HostPaths,
        request: &ProvisionRequest,
        report: &RunReport,
    ) -> Result<Self, ProvisionError> {
        let home = accounts::user_home(paths, &request.user).await?;
        let applied = |step: &str| report.outcome(step) == Some(&StepOutcome::Applied);

        Ok(Self {
            user: request.user.clone(),
            key_path: home.join(".ssh").join("id_rsa").display().to_string(),
            ssh_port: request.ssh_port,
            honeypot_port: request.honeypot_port,
            honeypot: applied("honeypot"),
            fail2ban: applied("fail2ban-jail"),
            failures: report
                .failures()
                .filter_map(|r| match &r.outcome {
                    StepOutcome::Failed { error } => Some(FailedStep {
                        step: r.step.clone(),
                        error: error.clone(),
                    }),
                    _ => None,
                })
                .collect(),
        })
    }

    /// Render the checklist
    pub fn render(&self) -> Result<String, ProvisionError> {
        render_template_with_context(GUIDANCE, self)
    }
}

/// Render a template string with any serializable context
pub fn render_template_with_context<S: Serialize>(
    template: &str,
    context: &S,
) -> Result<String, ProvisionError> {
    debug!("Rendering guidance template");

    let mut env = Environment::new();
    env.add_template("template", template)?;
    let tmpl = env.get_template("template")?;
    Ok(tmpl.render(context)?)
}
