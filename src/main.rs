use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog_filter::{
    ArgumentTreeAssembler, CatalogObjectWhereArgs, FilterCompiler, FilterConfig, FilterError, OrSemantics, Predicate,
    SqlCompiler,
};

const DEFAULT_CONFIG_FILE: &str = "catalog_filter.json";

/// 加载配置，优先使用JSON配置，失败时使用默认配置
fn load_config(path: &str) -> FilterConfig {
    match FilterConfig::from_json_file(path) {
        Ok(config) => {
            info!(path, "loaded configuration");
            println!("✅ 成功从JSON配置文件加载配置: {}", path);
            config
        }
        Err(e) => {
            warn!(error = %e, "falling back to default configuration");
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            FilterConfig::default()
        }
    }
}

/// 交互命令
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Quit,
    Help,
    /// 切换 OR 语义
    Mode(OrSemantics),
    /// 切换 JSON 输出
    Json,
    /// 过滤字符串或 JSON 参数树
    Input(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix(':') else {
            return Command::Input(line);
        };

        let mut words = command.split_whitespace();
        match (words.next(), words.next()) {
            (Some("quit" | "q"), None) => Command::Quit,
            (Some("help"), None) => Command::Help,
            (Some("json"), None) => Command::Json,
            (Some("mode"), Some("compatible")) => Command::Mode(OrSemantics::Compatible),
            (Some("mode"), Some("honor")) => Command::Mode(OrSemantics::Honor),
            _ => Command::Unknown(line),
        }
    }
}

struct Shell {
    config: FilterConfig,
    sql_compiler: SqlCompiler,
    assembler: ArgumentTreeAssembler,
    json_output: bool,
}

impl Shell {
    fn new(config: FilterConfig) -> Self {
        Self {
            sql_compiler: SqlCompiler::from_config(&config),
            assembler: ArgumentTreeAssembler::from_config(&config),
            config,
            json_output: false,
        }
    }

    /// 以 `{` 开头的输入按 JSON 参数树处理，其余按过滤语言处理
    fn translate(&self, input: &str) -> Result<Predicate, FilterError> {
        if input.starts_with('{') {
            let args = CatalogObjectWhereArgs::from_json(input)?;
            self.assembler.assemble(&args)
        } else {
            FilterCompiler::from_config(&self.config).compile(input)
        }
    }

    fn run(&self, input: &str) -> Result<()> {
        let predicate = match self.translate(input) {
            Ok(predicate) => predicate,
            Err(FilterError::Syntax(errors)) => {
                println!("✗ 语法错误:");
                for error in errors {
                    println!("  {}", error);
                }
                return Ok(());
            }
            Err(e) => {
                println!("✗ 转换失败: {}", e);
                return Ok(());
            }
        };

        println!("\n[谓词树]:");
        if self.json_output {
            println!("{}", serde_json::to_string_pretty(&predicate)?);
        } else {
            println!("{}", predicate);
        }

        match self.sql_compiler.compile(&predicate) {
            Ok(result) => {
                println!("\n[生成的 SQL]:");
                println!("{}", result.sql);
                if !result.optimizations.is_empty() {
                    println!("\n[应用的优化]:");
                    for opt in &result.optimizations {
                        println!("• {:?}", opt);
                    }
                }
            }
            Err(e) => println!("✗ SQL 编译失败: {}", e),
        }
        println!();
        Ok(())
    }
}

fn print_help() {
    println!("输入过滤表达式，例如: name = \"wf*\" AND variable(\"CPU\", \"4\")");
    println!("或者 JSON 参数树，例如: {{\"and\": [{{\"bucketId\": {{\"eq\": 1}}}}, {{\"kind\": {{\"eq\": \"workflow\"}}}}]}}");
    println!("命令: :mode compatible|honor  :json  :help  :quit");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("--- Catalog Filter: 过滤表达式到谓词树与 SQL ---");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let mut shell = Shell::new(load_config(&config_path));
    println!("当前 OR 语义: {:?}", shell.config.or_semantics);
    print_help();

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str())?;

                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Help => print_help(),
                    Command::Json => {
                        shell.json_output = !shell.json_output;
                        println!("JSON 输出: {}", if shell.json_output { "开启" } else { "关闭" });
                    }
                    Command::Mode(or_semantics) => {
                        shell.config.or_semantics = or_semantics;
                        println!("当前 OR 语义: {:?}", or_semantics);
                    }
                    Command::Input(input) => shell.run(input)?,
                    Command::Unknown(command) => println!("未知命令: {}", command),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(":quit"), Command::Quit);
        assert_eq!(Command::parse(" :q "), Command::Quit);
        assert_eq!(Command::parse(":mode honor"), Command::Mode(OrSemantics::Honor));
        assert_eq!(Command::parse(":mode compatible"), Command::Mode(OrSemantics::Compatible));
        assert_eq!(Command::parse(":mode sometimes"), Command::Unknown(":mode sometimes"));
        assert_eq!(Command::parse(r#"name = "a""#), Command::Input(r#"name = "a""#));
    }

    #[test]
    fn test_translate_dispatches_on_input_shape() {
        let shell = Shell::new(FilterConfig::default());
        assert!(shell.translate(r#"{"name": {"eq": "a"}}"#).is_ok());
        assert!(shell.translate(r#"name = "a""#).is_ok());
        assert!(matches!(
            shell.translate(r#"{"name": "a"}"#),
            Err(FilterError::MalformedArgumentTree(_))
        ));
    }
}
