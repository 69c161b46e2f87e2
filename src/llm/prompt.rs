use chrono::{DateTime, Duration, FixedOffset};

/// Builds the instruction sent to the completion service. The embedded
/// schema is the wire contract with the model; keep it in sync with
/// `decode_reply`.
pub fn build_prompt(text: &str, now: DateTime<FixedOffset>) -> String {
    let tomorrow = (now + Duration::days(1)).format("%Y-%m-%d");
    format!(
        r#"Analise o seguinte texto em português e extraia informações para criar um lembrete.

Texto: "{text}"

Retorne APENAS um JSON válido com esta estrutura exata:
{{
  "content": "descrição do lembrete",
  "isRecurring": boolean,
  "frequency": "WEEKLY" | "DAILY" | "MONTHLY" | null,
  "daysOfWeek": [array de números 0-6 onde 0=domingo, 1=segunda...],
  "nextRunAt": "data ISO 8601",
  "time": "HH:mm" ou null,
  "confidence": número 0-1
}}

Regras:
- Se não mencionar recorrência, isRecurring deve ser false
- Dias: segunda=1, terça=2, quarta=3, quinta=4, sexta=5, sábado=6, domingo=0
- Se mencionar "todo dia", frequency = "DAILY"
- Se mencionar "toda semana", frequency = "WEEKLY"
- Se mencionar "todo mês", frequency = "MONTHLY"
- Para horários, use formato 24h (ex: "7h" = "07:00", "14:30" = "14:30")
- Calcule a próxima ocorrência baseada na data atual: {now}
- confidence deve ser 0.9 se for claro, 0.6 se for ambíguo

Exemplos:
"academia toda segunda e quarta às 7h" -> recurring weekly, daysOfWeek [1,3], time "07:00"
"reunião amanhã às 14h" -> não recurring, amanhã = {tomorrow}, time "14:00"
"pagar aluguel todo dia 10" -> recurring monthly, day 10
"#,
        text = text,
        now = now.to_rfc3339(),
        tomorrow = tomorrow,
    )
}
