use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;
use uuid::Uuid;

struct SeedDomain<'a> {
    name: &'a str,
    benchmark_private_sector: f64,
    p25: f64,
    p75: f64,
    diagnosis_low: &'a str,
    diagnosis_medium: &'a str,
    diagnosis_high: &'a str,
    /// (item number, text, inverted)
    questions: &'a [(u8, &'a str, bool)],
}

const DEFAULT_TEMPLATE_NAME: &str = "Indicador de Riscos Psicossociais";

const DEFAULT_DOMAINS: &[SeedDomain<'static>] = &[
    SeedDomain {
        name: "Demandas",
        benchmark_private_sector: 3.44,
        p25: 3.13,
        p75: 3.75,
        diagnosis_low: "Carga de trabalho, prazos e ritmo estão acima do suportável para boa parte da equipe. Revise distribuição de tarefas e metas.",
        diagnosis_medium: "As demandas estão dentro da média do mercado, mas há sinais pontuais de sobrecarga.",
        diagnosis_high: "As demandas de trabalho são percebidas como bem dimensionadas.",
        questions: &[
            (3, "Pessoas diferentes no trabalho exigem de mim coisas difíceis de conciliar", true),
            (6, "Tenho prazos impossíveis de cumprir", true),
            (9, "Tenho que trabalhar muito intensamente", true),
            (12, "Tenho que deixar algumas tarefas de lado porque tenho coisas demais para fazer", true),
            (16, "Não consigo fazer pausas suficientes", true),
            (18, "Sou pressionado(a) a trabalhar por longos períodos", true),
            (20, "Tenho que trabalhar muito rápido", true),
            (22, "Tenho pressões de tempo irrealistas", true),
        ],
    },
    SeedDomain {
        name: "Controle",
        benchmark_private_sector: 3.53,
        p25: 3.17,
        p75: 3.83,
        diagnosis_low: "Os colaboradores têm pouca autonomia sobre como e quando realizam o trabalho.",
        diagnosis_medium: "A autonomia é razoável, mas pode ser ampliada em decisões sobre ritmo e método.",
        diagnosis_high: "Os colaboradores percebem boa autonomia sobre seu trabalho.",
        questions: &[
            (2, "Posso decidir quando fazer uma pausa", false),
            (10, "Tenho participação na definição do meu ritmo de trabalho", false),
            (15, "Tenho liberdade de escolha para decidir como fazer meu trabalho", false),
            (19, "Tenho liberdade para decidir o que fazer no meu trabalho", false),
            (25, "Tenho voz sobre a forma como faço meu trabalho", false),
            (30, "Meu horário de trabalho pode ser flexível", false),
        ],
    },
    SeedDomain {
        name: "Apoio da Chefia",
        benchmark_private_sector: 3.66,
        p25: 3.2,
        p75: 4.0,
        diagnosis_low: "Há baixa percepção de apoio das lideranças. Considere capacitação de gestores e rituais de feedback.",
        diagnosis_medium: "O apoio da chefia é percebido de forma irregular entre as equipes.",
        diagnosis_high: "As lideranças são percebidas como próximas e disponíveis.",
        questions: &[
            (8, "Recebo feedback de apoio sobre o trabalho que faço", false),
            (23, "Posso contar com meu chefe imediato para me ajudar com um problema de trabalho", false),
            (29, "Posso conversar com meu chefe imediato sobre algo que me incomodou no trabalho", false),
            (33, "Recebo apoio em trabalhos emocionalmente exigentes", false),
            (35, "Meu chefe imediato me incentiva no trabalho", false),
        ],
    },
    SeedDomain {
        name: "Apoio dos Colegas",
        benchmark_private_sector: 3.86,
        p25: 3.5,
        p75: 4.25,
        diagnosis_low: "A colaboração entre colegas está fragilizada.",
        diagnosis_medium: "Existe apoio entre colegas, mas ele não é percebido de forma consistente.",
        diagnosis_high: "Os colegas se apoiam e se respeitam mutuamente.",
        questions: &[
            (7, "Se o trabalho fica difícil, meus colegas me ajudam", false),
            (24, "Recebo a ajuda e o apoio de que preciso dos colegas", false),
            (27, "Recebo o respeito que mereço dos meus colegas", false),
            (31, "Meus colegas estão dispostos a ouvir meus problemas relacionados ao trabalho", false),
        ],
    },
    SeedDomain {
        name: "Relacionamentos",
        benchmark_private_sector: 4.06,
        p25: 3.75,
        p75: 4.5,
        diagnosis_low: "Há indícios de conflitos ou comportamentos inaceitáveis. Investigue com prioridade.",
        diagnosis_medium: "Os relacionamentos são em geral saudáveis, com focos de tensão.",
        diagnosis_high: "Não há sinais relevantes de conflito ou assédio.",
        questions: &[
            (5, "Sou alvo de assédio pessoal na forma de palavras ou comportamentos indelicados", true),
            (14, "Há atritos ou conflitos entre colegas", true),
            (21, "Sou alvo de intimidação ou assédio moral no trabalho", true),
            (34, "As relações no trabalho são tensas", true),
        ],
    },
    SeedDomain {
        name: "Cargo",
        benchmark_private_sector: 4.28,
        p25: 4.0,
        p75: 4.6,
        diagnosis_low: "Papéis e responsabilidades não estão claros para os colaboradores.",
        diagnosis_medium: "Há clareza parcial sobre papéis; reforce a comunicação de objetivos.",
        diagnosis_high: "Os colaboradores entendem bem seu papel e responsabilidades.",
        questions: &[
            (1, "Tenho clareza sobre o que se espera de mim no trabalho", false),
            (4, "Sei como realizar o meu trabalho", false),
            (11, "Tenho clareza sobre quais são minhas tarefas e responsabilidades", false),
            (13, "Tenho clareza sobre os objetivos e metas do meu setor", false),
            (17, "Entendo como meu trabalho se encaixa nos objetivos gerais da organização", false),
        ],
    },
    SeedDomain {
        name: "Comunicação e Mudanças",
        benchmark_private_sector: 3.34,
        p25: 3.0,
        p75: 3.67,
        diagnosis_low: "Mudanças são implementadas sem consulta ou explicação suficiente.",
        diagnosis_medium: "A comunicação sobre mudanças é adequada, mas a participação dos colaboradores é limitada.",
        diagnosis_high: "As mudanças são bem comunicadas e discutidas com as equipes.",
        questions: &[
            (26, "Tenho oportunidades suficientes para questionar os gestores sobre mudanças no trabalho", false),
            (28, "Os funcionários são sempre consultados sobre mudanças no trabalho", false),
            (32, "Quando há mudanças no trabalho, sei como elas funcionarão na prática", false),
        ],
    },
];

pub async fn seed_all(pool: &PgPool, admin: Option<(&str, &str)>) -> Result<()> {
    seed_default_template(pool).await?;
    if let Some((email, password)) = admin {
        seed_admin(pool, email, password).await?;
    }
    Ok(())
}

async fn seed_default_template(pool: &PgPool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM survey_templates")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let template_id = Uuid::new_v4();
    sqlx::query("INSERT INTO survey_templates (id, name) VALUES ($1, $2)")
        .bind(template_id)
        .bind(DEFAULT_TEMPLATE_NAME)
        .execute(&mut *tx)
        .await?;

    let mut question_count = 0;
    for (domain_idx, domain) in DEFAULT_DOMAINS.iter().enumerate() {
        let domain_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO domains (
                id, template_id, name, order_index, benchmark_private_sector, p25, p75,
                diagnosis_low, diagnosis_medium, diagnosis_high
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(domain_id)
        .bind(template_id)
        .bind(domain.name)
        .bind(domain_idx as i32)
        .bind(domain.benchmark_private_sector)
        .bind(domain.p25)
        .bind(domain.p75)
        .bind(domain.diagnosis_low)
        .bind(domain.diagnosis_medium)
        .bind(domain.diagnosis_high)
        .execute(&mut *tx)
        .await?;

        for (question_idx, (number, text, inverted)) in domain.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO questions (id, domain_id, code, text, is_inverted, order_index)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(domain_id)
            .bind(format!("Q-{number:02}"))
            .bind(*text)
            .bind(*inverted)
            .bind(question_idx as i32)
            .execute(&mut *tx)
            .await?;
            question_count += 1;
        }
    }
    tx.commit().await?;

    tracing::info!(
        "Seeded template '{}' with {} domains and {} questions",
        DEFAULT_TEMPLATE_NAME,
        DEFAULT_DOMAINS.len(),
        question_count
    );
    Ok(())
}

async fn seed_admin(pool: &PgPool, email: &str, password: &str) -> Result<()> {
    let salt = SaltString::generate(rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO admins (id, email, hash, name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hash)
    .bind("Administrador")
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!("Bootstrap admin {} created", email);
    }
    Ok(())
}
