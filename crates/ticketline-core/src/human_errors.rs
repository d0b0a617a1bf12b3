// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the counter operator.
//
// Every technical error is mapped to plain Portuguese with a clear suggestion.
// Printer-selection errors also carry a diagnostic checklist that the settings
// dialog (or `ticketline select`) shows step by step.

use crate::error::TicketlineError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Tool timeout or busy spooler. Trying again may work.
    Transient,
    /// The operator must do something (install, configure, switch on).
    ActionRequired,
    /// Cannot be fixed by retrying or operator action.
    Permanent,
}

/// A human-readable error with a message, a suggestion and an optional
/// diagnostic checklist.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Ordered checks to walk through, empty when not applicable.
    pub checklist: Vec<String>,
    /// Whether trying again without changes might succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in the UI).
    pub severity: Severity,
}

impl HumanError {
    /// Render message, suggestion and checklist as plain text.
    pub fn to_text(&self) -> String {
        let mut text = format!("{}\n{}", self.message, self.suggestion);
        for (i, item) in self.checklist.iter().enumerate() {
            text.push_str(&format!("\n  {}. {item}", i + 1));
        }
        text
    }
}

/// Checks shared by configuration and resolution failures.
fn printer_checklist(fallback: &str) -> Vec<String> {
    vec![
        "A impressora está ligada e conectada (USB ou rede)?".into(),
        "A impressora aparece em `ticketline printers`?".into(),
        format!("O nome instalado contém \"{fallback}\" ou foi selecionado com `ticketline select`?"),
        "A fila da impressora não está pausada nem com erro no sistema?".into(),
    ]
}

/// Convert a `TicketlineError` into a `HumanError` the operator can act on.
///
/// `fallback` is the printer identifier the resolver matches against when no
/// printer is selected; the diagnostic checklist names it.
pub fn humanize_error(err: &TicketlineError, fallback: &str) -> HumanError {
    match err {
        TicketlineError::Configuration(detail) => HumanError {
            message: "Nenhuma impressora de senhas configurada.".into(),
            suggestion: format!("Selecione uma impressora instalada e tente novamente. ({detail})"),
            checklist: printer_checklist(fallback),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        TicketlineError::Resolution(detail) => HumanError {
            message: "A impressora escolhida não está disponível.".into(),
            suggestion: format!("Verifique os itens abaixo antes de salvar. ({detail})"),
            checklist: printer_checklist(fallback),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        TicketlineError::TransientTool { tool, detail } => {
            let lower = detail.to_lowercase();
            if lower.contains("timed out") {
                HumanError {
                    message: "O sistema de impressão demorou demais para responder.".into(),
                    suggestion: format!("Tente novamente em alguns segundos. ({tool})"),
                    checklist: Vec::new(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            } else {
                HumanError {
                    message: "O sistema de impressão retornou um erro.".into(),
                    suggestion: format!("Tente novamente. Se persistir, reinicie o spooler. ({tool}: {detail})"),
                    checklist: Vec::new(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        TicketlineError::Dispatch(detail) => HumanError {
            message: "Não foi possível enviar a senha para a impressora.".into(),
            suggestion: format!("Verifique se o comando de impressão está instalado. ({detail})"),
            checklist: Vec::new(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        TicketlineError::Render(detail) => HumanError {
            message: "Não foi possível gerar a senha.".into(),
            suggestion: format!("Confira os dados enviados e o espaço em disco. ({detail})"),
            checklist: Vec::new(),
            retriable: false,
            severity: Severity::Permanent,
        },

        TicketlineError::Server(detail) => HumanError {
            message: "O servidor de impressão teve um problema.".into(),
            suggestion: format!("Verifique se outra instância já está usando a porta. ({detail})"),
            checklist: Vec::new(),
            retriable: true,
            severity: Severity::Transient,
        },

        TicketlineError::Client(_) => HumanError {
            message: "O servidor não está respondendo.".into(),
            suggestion: "Inicie o Ticketline e tente novamente.".into(),
            checklist: Vec::new(),
            retriable: true,
            severity: Severity::Transient,
        },

        TicketlineError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Sem permissão para gravar os arquivos do Ticketline.".into(),
                    suggestion: "Verifique as permissões da pasta de dados.".into(),
                    checklist: Vec::new(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "Houve um problema ao ler ou gravar um arquivo.".into(),
                    suggestion: "Tente novamente. Se persistir, o disco pode estar cheio.".into(),
                    checklist: Vec::new(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        TicketlineError::Serialization(_) | TicketlineError::Fatal(_) => HumanError {
            message: "O Ticketline teve um problema interno.".into(),
            suggestion: "Tente novamente. Se persistir, reinicie o aplicativo.".into(),
            checklist: Vec::new(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_needs_action_and_has_checklist() {
        let human = humanize_error(&TicketlineError::Configuration("none resolved".into()), "ticket-printer");
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(!human.checklist.is_empty());
    }

    #[test]
    fn tool_timeout_is_transient() {
        let human = humanize_error(&TicketlineError::tool("lpstat", "timed out after 10s"), "ticket-printer");
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn checklist_is_numbered_in_text() {
        let human = humanize_error(&TicketlineError::Resolution("HP offline".into()), "ticket-printer");
        let text = human.to_text();
        assert!(text.contains("\n  1. "));
        assert!(text.contains("ticket-printer"));
    }

    #[test]
    fn checklist_names_the_configured_fallback() {
        let human = humanize_error(&TicketlineError::Configuration("none resolved".into()), "senhas-balcao");
        let text = human.to_text();
        assert!(text.contains("\"senhas-balcao\""), "{text}");
        assert!(!text.contains("ticket-printer"), "{text}");
    }
}
