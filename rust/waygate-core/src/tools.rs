//! The static tool registry: which gateway path serves which tool, the
//! scope a session must hold to use it, and where it lands on the resource
//! server.
//!
//! Session selection at the gateway is keyed by capability (the required
//! scope), so the registry is data that the dispatcher walks rather than a
//! set of hard-coded branches.

/// One routable tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolRoute {
    /// Stable tool identifier as used in delegations and policy calls
    pub tool_id: &'static str,
    /// The short name that appears after `/mcp/` on the gateway
    pub name: &'static str,
    /// The path the gateway exposes to agents
    pub gateway_path: &'static str,
    /// The path template on the resource server; `{orderId}` is substituted
    /// from the request
    pub upstream_path: &'static str,
    /// The scope a session must have been granted for this tool
    pub required_scope: &'static str,
    /// HTTP method the tool is called with
    pub method: &'static str,
}

/// Every tool the gateway knows how to route.
pub const TOOL_ROUTES: &[ToolRoute] = &[
    ToolRoute {
        tool_id: "mcp.echo",
        name: "echo",
        gateway_path: "/mcp/echo",
        upstream_path: "/mcp/echo",
        required_scope: "echo:read",
        method: "GET",
    },
    ToolRoute {
        tool_id: "mcp.tickets",
        name: "tickets",
        gateway_path: "/mcp/tickets",
        upstream_path: "/tickets",
        required_scope: "tickets:read",
        method: "GET",
    },
    ToolRoute {
        tool_id: "mcp.pay",
        name: "pay",
        gateway_path: "/mcp/pay",
        upstream_path: "/orders/{orderId}/pay",
        required_scope: "payments:charge",
        method: "POST",
    },
];

/// Look a tool up by its stable identifier (e.g. `mcp.echo`).
pub fn tool_by_id(tool_id: &str) -> Option<&'static ToolRoute> {
    TOOL_ROUTES.iter().find(|route| route.tool_id == tool_id)
}

/// Look a tool up by the `<tool>` segment of a gateway `/mcp/<tool>` path.
pub fn tool_by_name(name: &str) -> Option<&'static ToolRoute> {
    TOOL_ROUTES.iter().find(|route| route.name == name)
}

impl ToolRoute {
    /// Render the upstream path, substituting `{orderId}` when the template
    /// calls for one. Returns [None] when an order ID is required but absent.
    pub fn upstream_path_for(&self, order_id: Option<&str>) -> Option<String> {
        if self.upstream_path.contains("{orderId}") {
            order_id.map(|order_id| self.upstream_path.replace("{orderId}", order_id))
        } else {
            Some(self.upstream_path.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_resolves_by_id_and_name() {
        for route in TOOL_ROUTES {
            assert_eq!(tool_by_id(route.tool_id), Some(route));
            assert_eq!(tool_by_name(route.name), Some(route));
        }
        assert!(tool_by_id("mcp.unknown").is_none());
        assert!(tool_by_name("unknown").is_none());
    }

    #[test]
    fn pay_path_substitutes_the_order_id() {
        let pay = tool_by_name("pay").unwrap();
        assert_eq!(
            pay.upstream_path_for(Some("order-1001")).unwrap(),
            "/orders/order-1001/pay"
        );
        assert!(pay.upstream_path_for(None).is_none());
    }

    #[test]
    fn non_payment_tools_ignore_the_order_id() {
        let echo = tool_by_name("echo").unwrap();
        assert_eq!(echo.upstream_path_for(None).unwrap(), "/mcp/echo");
    }
}
