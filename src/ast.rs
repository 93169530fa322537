use crate::token::Span;

/// 语法树的根节点, 代表一个完整的过滤表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Expression(pub AndExpression);

/// 由 AND 连接的一个或多个 OR 表达式
///
/// 注意优先级: OR 比 AND 绑定得更紧, `a OR b AND c` 等价于 `(a OR b) AND c`
#[derive(Debug, Clone, PartialEq)]
pub struct AndExpression {
    /// 至少包含一个元素, 第一个之后的每个元素前面都有一个 AND
    pub operands: Vec<OrExpression>,
}

/// 由 OR 连接的一个或多个子句
#[derive(Debug, Clone, PartialEq)]
pub struct OrExpression {
    /// 至少包含一个元素, 第一个之后的每个元素前面都有一个 OR
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

/// 子句, 语法树的叶子或括号分组
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// 原子子句, 例如：`name = "my-workflow"`
    Atomic {
        attribute: Identifier,
        operator: CompOp,
        /// 原始字符串, 包含引号
        literal: String,
        span: Span,
    },
    /// 键值子句, 例如：`generic_information("Infrastructure", "Amazon EC2")`
    KeyValue {
        pair_type: Identifier,
        /// 原始字符串, 包含引号
        key: String,
        value: String,
        span: Span,
    },
    /// 使用括号分组的子表达式
    Group(Box<AndExpression>),
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompOp {
    Equal,    // =
    NotEqual, // !=
}
