//! noema CLI: the cognitive core of an AI agent.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use noema::brain::{AgentBrain, TaskContext};
use noema::graph::KnowledgeGraph;
use noema::memory::{MemoryScope, MemoryStore, MemoryType};
use noema::reason::Reasoner;
use noema::reason::heuristic::HeuristicReasoner;
use noema::reason::ollama::{OllamaConfig, OllamaReasoner};
use noema::skills::{SkillCategory, SkillRegistry};
use noema::store::Store;

#[derive(Parser)]
#[command(name = "noema", version, about = "Agent cognitive core")]
struct Cli {
    /// Data directory for persistent storage. Omit for in-memory only.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Skip the Ollama probe and use the offline heuristic reasoner.
    #[arg(long, global = true)]
    no_ollama: bool,

    /// Ollama model to use when available.
    #[arg(long, global = true, default_value = "llama3.2")]
    model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a noema data directory.
    Init,

    /// Store a memory.
    Remember {
        /// Owning user; omit for a universal memory.
        #[arg(long)]
        user: Option<String>,

        /// Memory text.
        content: String,

        /// Memory type (fact, pattern, solution, error_fix, optimization,
        /// preference, context, conversation, task_history, feedback).
        #[arg(long, default_value = "fact")]
        memory_type: String,

        /// Importance in [0, 1].
        #[arg(long, default_value = "0.5")]
        importance: f32,
    },

    /// Search memories by similarity.
    Recall {
        /// Owning user; omit to search universal memories.
        #[arg(long)]
        user: Option<String>,

        /// Search query.
        query: String,

        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Manage the skill registry.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Inspect the knowledge graph.
    Graph {
        #[command(subcommand)]
        action: GraphAction,
    },

    /// Gather relevant context and a plan for a task.
    Think {
        /// Acting user.
        #[arg(long, default_value = "default")]
        user: String,

        /// Task description.
        task: String,
    },

    /// Record a completed task and learn from it.
    LearnTask {
        /// Acting user.
        #[arg(long, default_value = "default")]
        user: String,

        /// Task description.
        task: String,

        /// Actions taken, comma-separated.
        #[arg(long)]
        actions: String,

        /// Whether the task succeeded.
        #[arg(long)]
        success: bool,

        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Render the context block that would be injected for a task.
    Context {
        /// Acting user.
        #[arg(long, default_value = "default")]
        user: String,

        /// Task description.
        task: String,

        /// Skip the planner section.
        #[arg(long)]
        no_plan: bool,
    },

    /// Show store statistics.
    Info,
}

#[derive(Subcommand)]
enum SkillAction {
    /// List all skills, grouped by category.
    List,
    /// Show details of a skill.
    Show {
        /// Skill name.
        name: String,
    },
    /// Learn (or merge into) a skill.
    Learn {
        /// Skill name.
        name: String,
        /// Category (coding, research, communication, analysis, automation,
        /// integration).
        #[arg(long, default_value = "coding")]
        category: String,
        /// Description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Record a usage outcome for a skill.
    Record {
        /// Skill name.
        name: String,
        /// Whether the usage succeeded.
        #[arg(long)]
        success: bool,
    },
}

#[derive(Subcommand)]
enum GraphAction {
    /// Find a node by name.
    Find {
        /// Node name (case-insensitive, substring fallback).
        name: String,
    },
    /// Search nodes by substring.
    Search {
        /// Query text.
        query: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

struct Services {
    memory: Arc<MemoryStore>,
    skills: Arc<SkillRegistry>,
    graph: Arc<KnowledgeGraph>,
}

impl Services {
    fn open(data_dir: Option<&PathBuf>) -> Result<Self> {
        let store = match data_dir {
            Some(dir) => Arc::new(Store::with_persistence(dir).into_diagnostic()?),
            None => Arc::new(Store::memory_only()),
        };
        Ok(Self {
            memory: Arc::new(MemoryStore::new(Arc::clone(&store)).into_diagnostic()?),
            skills: Arc::new(SkillRegistry::new(Arc::clone(&store)).into_diagnostic()?),
            graph: Arc::new(KnowledgeGraph::new(store).into_diagnostic()?),
        })
    }

    fn brain(self, reasoner: Arc<dyn Reasoner>) -> AgentBrain {
        AgentBrain::new(self.memory, self.skills, self.graph, reasoner)
    }
}

fn pick_reasoner(no_ollama: bool, model: &str) -> Arc<dyn Reasoner> {
    if !no_ollama {
        let mut ollama = OllamaReasoner::new(OllamaConfig {
            model: model.to_string(),
            ..Default::default()
        });
        if ollama.probe() {
            return Arc::new(ollama);
        }
        tracing::info!("Ollama not reachable, using the offline heuristic reasoner");
    }
    Arc::new(HeuristicReasoner)
}

fn parse_memory_type(s: &str) -> Result<MemoryType> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| miette::miette!("unknown memory type: \"{s}\""))
}

fn scope_for(user: Option<String>) -> MemoryScope {
    match user {
        Some(id) => MemoryScope::User(id),
        None => MemoryScope::Universal,
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from(".noema"));
            let services = Services::open(Some(&data_dir))?;
            println!("Initialized noema at {}", data_dir.display());
            println!(
                "  memories: {}, skills: {}, nodes: {}",
                services.memory.len(),
                services.skills.len(),
                services.graph.node_count()
            );
        }

        Commands::Remember {
            user,
            content,
            memory_type,
            importance,
        } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            let memory_type = parse_memory_type(&memory_type)?;
            let id = services
                .memory
                .add_memory(scope_for(user), memory_type, &content, importance, None)
                .into_diagnostic()?;
            println!("Stored memory {id}");
        }

        Commands::Recall { user, query, limit } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            let hits = services.memory.search_memory(&scope_for(user), &query, limit);
            if hits.is_empty() {
                println!("No matching memories.");
            } else {
                for hit in &hits {
                    match hit.similarity {
                        Some(sim) => println!(
                            "  [{}] {} (similarity {:.3})",
                            hit.memory_type, hit.content, sim
                        ),
                        None => println!("  [{}] {}", hit.memory_type, hit.content),
                    }
                }
            }
        }

        Commands::Skill { action } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            match action {
                SkillAction::List => {
                    let skills = services.skills.get_all();
                    if skills.is_empty() {
                        println!("No skills learned.");
                    } else {
                        println!("Skills ({}):", skills.len());
                        for skill in &skills {
                            println!(
                                "  {} [{}] used {}x, {:.0}% success",
                                skill.name,
                                skill.category,
                                skill.usage_count,
                                skill.success_rate * 100.0
                            );
                        }
                    }
                }
                SkillAction::Show { name } => match services.skills.get_skill(&name) {
                    Some(skill) => {
                        println!("Skill: \"{}\"", skill.name);
                        println!("  category:    {}", skill.category);
                        println!("  description: {}", skill.description);
                        println!("  usage_count: {}", skill.usage_count);
                        println!("  success:     {:.0}%", skill.success_rate * 100.0);
                        println!("  proficiency: {}", skill.proficiency_level);
                        if !skill.knowledge.is_empty() {
                            let json = serde_json::to_string_pretty(&skill.knowledge)
                                .into_diagnostic()?;
                            println!("  knowledge:   {json}");
                        }
                    }
                    None => println!("No skill named \"{name}\"."),
                },
                SkillAction::Learn {
                    name,
                    category,
                    description,
                } => {
                    let category: SkillCategory = category.parse().into_diagnostic()?;
                    let id = services
                        .skills
                        .learn_skill(&name, category, &description, serde_json::Map::new())
                        .into_diagnostic()?;
                    println!("Learned skill \"{name}\" (id {id})");
                }
                SkillAction::Record { name, success } => {
                    services
                        .skills
                        .record_usage(&name, success)
                        .into_diagnostic()?;
                    let skill = services
                        .skills
                        .get_skill(&name)
                        .ok_or_else(|| miette::miette!("skill vanished after update"))?;
                    println!(
                        "Recorded {} for \"{name}\": {} uses, {:.0}% success",
                        if success { "success" } else { "failure" },
                        skill.usage_count,
                        skill.success_rate * 100.0
                    );
                }
            }
        }

        Commands::Graph { action } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            match action {
                GraphAction::Find { name } => match services.graph.find_node_by_name(&name) {
                    Some(node) => {
                        println!("Node {} \"{}\" [{}]", node.id, node.name, node.node_type);
                        if !node.content.is_empty() {
                            println!("  {}", node.content);
                        }
                        for related in services.graph.get_related_nodes(node.id) {
                            println!(
                                "  -> {} -> \"{}\" (weight {:.1})",
                                related.relation_type, related.node.name, related.weight
                            );
                        }
                    }
                    None => println!("No node named \"{name}\"."),
                },
                GraphAction::Search { query, limit } => {
                    let nodes = services.graph.search_graph(&query, limit);
                    if nodes.is_empty() {
                        println!("No matching nodes.");
                    } else {
                        for node in &nodes {
                            println!("  {} \"{}\" [{}]", node.id, node.name, node.node_type);
                        }
                    }
                }
            }
        }

        Commands::Think { user, task } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            let brain = services.brain(pick_reasoner(cli.no_ollama, &cli.model));
            let ctx = brain.think(&TaskContext::new(user, task));

            println!("Suggested approach: {}", ctx.suggested_approach);
            if !ctx.relevant_memories.is_empty() {
                println!("Memories ({}):", ctx.relevant_memories.len());
                for hit in &ctx.relevant_memories {
                    println!("  [{}] {}", hit.memory_type, hit.content);
                }
            }
            if !ctx.relevant_skills.is_empty() {
                println!("Skills ({}):", ctx.relevant_skills.len());
                for skill in &ctx.relevant_skills {
                    println!("  {} [{}]", skill.name, skill.category);
                }
            }
            if !ctx.relevant_knowledge.is_empty() {
                println!("Knowledge ({}):", ctx.relevant_knowledge.len());
                for m in &ctx.relevant_knowledge {
                    println!("  \"{}\" [{}]", m.node.name, m.node.node_type);
                    for r in &m.related {
                        println!("    -> {} -> \"{}\"", r.relation_type, r.related_name);
                    }
                }
            }
            if let Some(plan) = &ctx.hierarchical_plan {
                if plan.is_empty() {
                    println!("Plan: (no viable steps found)");
                } else {
                    println!("Plan:");
                    for (i, step) in plan.iter().enumerate() {
                        println!("  {}. {step}", i + 1);
                    }
                }
            }
        }

        Commands::LearnTask {
            user,
            task,
            actions,
            success,
            notes,
        } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            let brain = services.brain(Arc::new(HeuristicReasoner));
            let actions: Vec<String> = actions
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            brain
                .learn_from_task(&user, &task, &actions, success, notes.as_deref())
                .into_diagnostic()?;
            println!(
                "Recorded {} task with {} actions",
                if success { "successful" } else { "failed" },
                actions.len()
            );
        }

        Commands::Context { user, task, no_plan } => {
            let services = Services::open(cli.data_dir.as_ref())?;
            let brain = services.brain(pick_reasoner(cli.no_ollama, &cli.model));
            let block = brain.get_context_for_task(&TaskContext::new(user, task), !no_plan);
            print!("{block}");
        }

        Commands::Info => {
            let services = Services::open(cli.data_dir.as_ref())?;
            println!("memories: {}", services.memory.len());
            println!("skills:   {}", services.skills.len());
            println!("nodes:    {}", services.graph.node_count());
            println!("edges:    {}", services.graph.edge_count());
        }
    }

    Ok(())
}
