//! Utility MCP server: arithmetic and text helpers plus a sample resource.

pub mod calculator;

use rmcp::{
    ErrorData as McpError, Json, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        AnnotateAble, Implementation, ListResourcesResult, PaginatedRequestParam,
        ProtocolVersion, RawResource, ReadResourceRequestParam, ReadResourceResult, Resource,
        ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use calculator::{CalculatorError, Value};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// URI of the sample greeting resource.
pub const GREETING_URI: &str = "sample://greeting";

/// Body of the sample greeting resource.
pub const GREETING_TEXT: &str = "Hello from MCP Server! This is a sample resource.";

//--------------------------------------------------------------------------------------------------
// Types: Calculator
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalculatorInput {
    /// Mathematical expression to evaluate (e.g., "2 + 3 * 4").
    pub expression: String,
}

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalculatorOutput {
    /// The expression as given.
    pub expression: String,

    /// The evaluated result (e.g., "14", "3.5", "[1, 2]").
    pub result: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Text Analyzer
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct TextAnalyzerInput {
    /// Text to analyze.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextAnalyzerOutput {
    /// Number of characters.
    pub char_count: usize,

    /// Number of whitespace-separated words.
    pub word_count: usize,

    /// Number of lines.
    pub line_count: usize,

    /// Number of characters excluding spaces, tabs and newlines.
    pub non_whitespace_count: usize,
}

//--------------------------------------------------------------------------------------------------
// Types: Reverse Text
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReverseTextInput {
    /// Text to reverse.
    pub text: String,
}

#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReverseTextOutput {
    /// The original text.
    pub original: String,

    /// The text with its characters in reverse order.
    pub reversed: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Server
//--------------------------------------------------------------------------------------------------

#[derive(Clone)]
pub struct Server {
    tool_router: ToolRouter<Self>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Server {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Public wrapper for calculator (for testing).
    pub async fn calculate(&self, input: CalculatorInput) -> Result<CalculatorOutput, McpError> {
        self.calculator(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for text_analyzer (for testing).
    pub async fn analyze(&self, input: TextAnalyzerInput) -> Result<TextAnalyzerOutput, McpError> {
        self.text_analyzer(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for reverse_text (for testing).
    pub async fn reverse(&self, input: ReverseTextInput) -> Result<ReverseTextOutput, McpError> {
        self.reverse_text(Parameters(input)).await.map(|j| j.0)
    }

    /// Resources exposed by this server.
    pub fn resources(&self) -> Vec<Resource> {
        let mut greeting = RawResource::new(GREETING_URI, "Sample Greeting");
        greeting.description = Some("A sample greeting resource".to_string());
        greeting.mime_type = Some("text/plain".to_string());

        vec![greeting.no_annotation()]
    }

    /// Read a resource body by URI.
    pub fn read_resource_text(&self, uri: &str) -> Result<String, McpError> {
        match uri {
            GREETING_URI => Ok(GREETING_TEXT.to_string()),
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {uri}"),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Text
//--------------------------------------------------------------------------------------------------

fn analyze_text(text: &str) -> TextAnalyzerOutput {
    TextAnalyzerOutput {
        char_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
        line_count: text.split('\n').count(),
        non_whitespace_count: text
            .chars()
            .filter(|c| !matches!(c, ' ' | '\n' | '\t'))
            .count(),
    }
}

fn reverse_chars(text: &str) -> String {
    text.chars().rev().collect()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations: Tool Router
//--------------------------------------------------------------------------------------------------

#[tool_router]
impl Server {
    /// Evaluates an arithmetic expression.
    ///
    /// Only literals, arithmetic operators and abs/round/min/max/pow/sum/len are allowed.
    #[tool(
        name = "calculator",
        description = "Perform basic mathematical calculations"
    )]
    async fn calculator(
        &self,
        params: Parameters<CalculatorInput>,
    ) -> Result<Json<CalculatorOutput>, McpError> {
        let input = params.0;

        let value = calculator::evaluate(&input.expression).map_err(|e| {
            tracing::debug!(expression = %input.expression, error = %e, "calculation failed");
            e.to_mcp_error()
        })?;

        Ok(Json(CalculatorOutput {
            expression: input.expression,
            result: value.to_string(),
        }))
    }

    /// Counts characters, words and lines.
    #[tool(
        name = "text_analyzer",
        description = "Analyze text and return statistics"
    )]
    async fn text_analyzer(
        &self,
        params: Parameters<TextAnalyzerInput>,
    ) -> Result<Json<TextAnalyzerOutput>, McpError> {
        Ok(Json(analyze_text(&params.0.text)))
    }

    #[tool(
        name = "reverse_text",
        description = "Reverse the order of characters in text"
    )]
    async fn reverse_text(
        &self,
        params: Parameters<ReverseTextInput>,
    ) -> Result<Json<ReverseTextOutput>, McpError> {
        let original = params.0.text;
        let reversed = reverse_chars(&original);

        Ok(Json(ReverseTextOutput { original, reversed }))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations: Server Handler
//--------------------------------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for Server {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: None,
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read_resource_text(&request.uri)?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
