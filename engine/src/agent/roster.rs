//! Specialist roster
//!
//! A lookup table of agent profiles, each with a pure `can_handle` scoring
//! function over the task text. Selection is argmax over the table with a
//! floor threshold: when no specialist scores high enough, the designated
//! default profile takes the task.

use serde::Serialize;
use tracing::debug;

/// Score added per specialty whose keywords appear in the task
const SPECIALTY_WEIGHT: f64 = 0.2;

/// One specialist profile
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    /// Short selector name (e.g. "seo")
    pub name: String,

    /// Human-readable role
    pub role: String,

    /// What this specialist is good at
    pub description: String,

    /// Specialty phrases used for scoring
    pub specialties: Vec<String>,

    /// Tools this specialist reaches for first
    pub preferred_tools: Vec<String>,
}

impl AgentProfile {
    /// Score how well this profile fits a task, in [0.0, 1.0]
    ///
    /// Pure function of the task text: each specialty whose words appear in
    /// the lowercased task adds 0.2, capped at 1.0.
    pub fn can_handle(&self, task: &str) -> f64 {
        let task_lower = task.to_lowercase();
        let mut score = 0.0;

        for specialty in &self.specialties {
            let hit = specialty
                .to_lowercase()
                .split_whitespace()
                .any(|word| task_lower.contains(word));
            if hit {
                score += SPECIALTY_WEIGHT;
            }
        }

        f64::min(score, 1.0)
    }

    /// Build the persona system prompt for this profile
    pub fn system_prompt(&self) -> String {
        let specialties = self
            .specialties
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are acting as {}, {}.\n\n\
            {}\n\n\
            Your specialties:\n{}\n\n\
            Preferred tools: {}\n\n\
            You are an expert in your domain; approach every task with \
            professionalism and creativity.",
            self.role,
            self.description,
            self.description,
            specialties,
            self.preferred_tools.join(", ")
        )
    }
}

/// The table of available profiles plus selection policy
pub struct Roster {
    profiles: Vec<AgentProfile>,
    default_profile: String,
    threshold: f64,
}

impl Roster {
    /// Create a roster from explicit profiles
    pub fn new(profiles: Vec<AgentProfile>, default_profile: &str, threshold: f64) -> Self {
        Self {
            profiles,
            default_profile: default_profile.to_string(),
            threshold,
        }
    }

    /// The built-in business-assistant roster
    pub fn standard(default_profile: &str, threshold: f64) -> Self {
        let profiles = vec![
            AgentProfile {
                name: "social".to_string(),
                role: "Social Media Manager".to_string(),
                description: "Expert in social media content, scheduling, and community engagement"
                    .to_string(),
                specialties: vec![
                    "social media posts".to_string(),
                    "content calendar".to_string(),
                    "hashtags".to_string(),
                    "engagement".to_string(),
                    "instagram".to_string(),
                    "audience growth".to_string(),
                ],
                preferred_tools: vec!["web_search".to_string()],
            },
            AgentProfile {
                name: "support".to_string(),
                role: "Customer Support Specialist".to_string(),
                description: "Expert in customer communication, ticket triage, and resolution"
                    .to_string(),
                specialties: vec![
                    "customer support".to_string(),
                    "tickets".to_string(),
                    "complaints".to_string(),
                    "refunds".to_string(),
                    "helpdesk".to_string(),
                ],
                preferred_tools: vec!["file_operations".to_string()],
            },
            AgentProfile {
                name: "seo".to_string(),
                role: "SEO Specialist".to_string(),
                description: "Expert in search optimization, keywords, and organic traffic"
                    .to_string(),
                specialties: vec![
                    "seo".to_string(),
                    "keywords".to_string(),
                    "backlinks".to_string(),
                    "ranking".to_string(),
                    "organic traffic".to_string(),
                ],
                preferred_tools: vec!["web_search".to_string()],
            },
            AgentProfile {
                name: "analytics".to_string(),
                role: "Data Analyst".to_string(),
                description: "Expert in metrics, dashboards, and business reporting".to_string(),
                specialties: vec![
                    "analytics".to_string(),
                    "metrics".to_string(),
                    "dashboards".to_string(),
                    "conversion".to_string(),
                    "kpi".to_string(),
                    "reporting".to_string(),
                ],
                preferred_tools: vec!["calculator".to_string(), "web_search".to_string()],
            },
            AgentProfile {
                name: "copywriter".to_string(),
                role: "Copywriter".to_string(),
                description: "Expert in persuasive writing for campaigns and pages".to_string(),
                specialties: vec![
                    "copywriting".to_string(),
                    "blog articles".to_string(),
                    "email campaigns".to_string(),
                    "landing pages".to_string(),
                    "newsletters".to_string(),
                ],
                preferred_tools: vec!["file_operations".to_string()],
            },
            AgentProfile {
                name: "generalist".to_string(),
                role: "General Assistant".to_string(),
                description: "A general purpose assistant for everything else".to_string(),
                specialties: vec![],
                preferred_tools: vec![],
            },
        ];

        Self::new(profiles, default_profile, threshold)
    }

    /// Select the best-fitting profile for a task
    ///
    /// Argmax of `can_handle` over the table; below the threshold the
    /// default profile is returned. Falls back to the first profile if the
    /// configured default is missing from the table.
    pub fn select(&self, task: &str) -> &AgentProfile {
        let best = self
            .profiles
            .iter()
            .map(|profile| (profile, profile.can_handle(task)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((profile, score)) if score >= self.threshold => {
                debug!("Selected profile {} (score {:.1})", profile.name, score);
                profile
            }
            _ => self.default(),
        }
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The default profile
    pub fn default(&self) -> &AgentProfile {
        self.get(&self.default_profile)
            .unwrap_or_else(|| &self.profiles[0])
    }

    /// All profiles in the table
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }
}
